//! Payloads for the FX-unit events the local receiver understands.
//!
//! Each event is posted to `fx/<unit>` as a single-key object naming the kind
//! of change, e.g. `{"Knob": {"path": "app.traktor.fx.1.knobs.1", ...}}`.

use serde::{Deserialize, Serialize};

pub mod endpoints {
    /// Endpoint for FX unit `unit` (1-based, as Traktor numbers them).
    pub fn fx(unit: u8) -> String {
        format!("fx/{unit}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeKind {
    Discrete,
    Continuous,
    Full,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    pub def: i32,
    pub steps: i32,
    #[serde(rename = "type")]
    pub kind: RangeKind,
    pub is_full: bool,
    pub is_continuous: bool,
    pub is_discrete: bool,
}

impl ValueRange {
    /// A `0..=1` range, as used by knobs and dry/wet.
    pub fn unit() -> Self {
        Self::continuous(0.0, 1.0)
    }

    pub fn continuous(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            def: 0,
            steps: 0,
            kind: RangeKind::Continuous,
            is_full: false,
            is_continuous: true,
            is_discrete: false,
        }
    }

    pub fn discrete(steps: i32) -> Self {
        Self {
            min: 0.0,
            max: f64::from(steps.saturating_sub(1).max(0)),
            def: 0,
            steps,
            kind: RangeKind::Discrete,
            is_full: false,
            is_continuous: false,
            is_discrete: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxParam {
    pub path: String,
    pub value: f64,
    pub description: String,
    pub enabled: bool,
    pub value_range: ValueRange,
    #[serde(default)]
    pub values_description: Vec<String>,
}

impl FxParam {
    /// Non-finite values become `0.0`; the receiver only accepts JSON numbers.
    pub fn new(path: impl Into<String>, value: f64, value_range: ValueRange) -> Self {
        Self {
            path: path.into(),
            value: if value.is_finite() { value } else { 0.0 },
            description: String::new(),
            enabled: true,
            value_range,
            values_description: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_values_description<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values_description = values.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxName {
    pub path: String,
    pub value: String,
    pub description: String,
    pub enabled: bool,
}

impl FxName {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: path.into(),
            description: name.clone(),
            value: name,
            enabled: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FxEvent {
    /// Unit mode changed (`Group`, `Single`, `Pattern Player`).
    Type(FxParam),
    /// Effect selected into a slot.
    Select(FxParam),
    DryWet(FxParam),
    Knob(FxParam),
    /// Knob label changed.
    Name(FxName),
    Param(FxParam),
}

impl FxEvent {
    pub fn path(&self) -> &str {
        match self {
            FxEvent::Type(p)
            | FxEvent::Select(p)
            | FxEvent::DryWet(p)
            | FxEvent::Knob(p)
            | FxEvent::Param(p) => &p.path,
            FxEvent::Name(n) => &n.path,
        }
    }

    pub fn knob(unit: u8, knob: u8, value: f64) -> Self {
        FxEvent::Knob(FxParam::new(
            format!("app.traktor.fx.{unit}.knobs.{knob}"),
            value,
            ValueRange::unit(),
        ))
    }

    pub fn dry_wet(unit: u8, value: f64) -> Self {
        let param =
            FxParam::new(format!("app.traktor.fx.{unit}.dry_wet"), value, ValueRange::unit());
        let percent = format!("{}%", (param.value.clamp(0.0, 1.0) * 100.0).round());
        FxEvent::DryWet(param.with_description(percent))
    }

    pub fn knob_name(unit: u8, knob: u8, name: impl Into<String>) -> Self {
        FxEvent::Name(FxName::new(
            format!("app.traktor.fx.{unit}.knobs.{knob}.name"),
            name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use sonic_rs::{JsonValueTrait, Value};

    use super::*;

    #[test]
    fn fx_endpoint_is_one_based_path() {
        assert_eq!(endpoints::fx(1), "fx/1");
        assert_eq!(endpoints::fx(4), "fx/4");
    }

    #[test]
    fn knob_event_uses_receiver_wire_names() {
        let event = FxEvent::knob(2, 3, 0.25);
        let json: Value = sonic_rs::from_slice(&sonic_rs::to_vec(&event).expect("serialize"))
            .expect("reparse");

        let inner = &json["Knob"];
        assert_eq!(inner["path"].as_str(), Some("app.traktor.fx.2.knobs.3"));
        assert_eq!(inner["value"].as_f64(), Some(0.25));
        assert_eq!(inner["valueRange"]["type"].as_str(), Some("Continuous"));
        assert_eq!(inner["valueRange"]["isContinuous"].as_bool(), Some(true));
        assert!(inner["valuesDescription"].is_array());
    }

    #[test]
    fn name_event_carries_string_value() {
        let event = FxEvent::knob_name(1, 3, "LEN");
        assert_eq!(event.path(), "app.traktor.fx.1.knobs.3.name");

        let body = sonic_rs::to_string(&event).expect("serialize");
        assert_eq!(
            body,
            r#"{"Name":{"path":"app.traktor.fx.1.knobs.3.name","value":"LEN","description":"LEN","enabled":true}}"#
        );
    }

    #[test]
    fn dry_wet_description_is_percentage() {
        match FxEvent::dry_wet(1, 1.0) {
            FxEvent::DryWet(param) => {
                assert_eq!(param.description, "100%");
                assert_eq!(param.path, "app.traktor.fx.1.dry_wet");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn discrete_range_spans_steps() {
        let range = ValueRange::discrete(32);
        assert_eq!(range.max, 31.0);
        assert!(range.is_discrete);
        assert_eq!(range.kind, RangeKind::Discrete);
    }

    #[test]
    fn non_finite_values_are_sent_as_zero() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let event = FxEvent::dry_wet(1, bad);
            match &event {
                FxEvent::DryWet(param) => {
                    assert_eq!(param.value, 0.0);
                    assert_eq!(param.description, "0%");
                }
                other => panic!("unexpected event {other:?}"),
            }

            let body = sonic_rs::to_vec(&event).expect("serialize");
            let parsed: FxEvent = sonic_rs::from_slice(&body).expect("receiver can parse it");
            assert_eq!(parsed, event);
        }

        assert_eq!(FxEvent::knob(1, 1, f64::NAN), FxEvent::knob(1, 1, 0.0));
    }

    #[test]
    fn select_event_lists_available_effects() {
        let event = FxEvent::Select(
            FxParam::new("app.traktor.fx.1.select.3", 20.0, ValueRange::discrete(3))
                .with_description("Auto Bouncer")
                .with_values_description(["No Effect", "Delay", "Auto Bouncer"]),
        );
        let body = sonic_rs::to_vec(&event).expect("serialize");
        let json: Value = sonic_rs::from_slice(&body).expect("reparse");
        assert_eq!(json["Select"]["valueRange"]["isDiscrete"].as_bool(), Some(true));

        match sonic_rs::from_slice::<FxEvent>(&body).expect("reparse as event") {
            FxEvent::Select(param) => {
                assert_eq!(param.values_description, ["No Effect", "Delay", "Auto Bouncer"]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
