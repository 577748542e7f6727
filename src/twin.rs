//! Initial twin state applied to a device when it is provisioned.

use serde::{Deserialize, Serialize};

/// Free-form JSON object of tags or properties.
pub type TwinCollection = serde_json::Map<String, serde_json::Value>;

/// Tags and desired properties the hub applies to the device twin at
/// provisioning time.
///
/// Wire form: `{"tags": {...}, "properties": {"desired": {...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwinState {
    /// Twin tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TwinCollection>,

    /// Desired properties wrapper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<TwinProperties>,
}

/// The `properties` section of a twin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwinProperties {
    /// Desired properties pushed to the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<TwinCollection>,
}

impl TwinState {
    /// Builds a twin from tags and desired properties.
    pub fn new(tags: Option<TwinCollection>, desired_properties: Option<TwinCollection>) -> Self {
        TwinState {
            tags,
            properties: desired_properties.map(|desired| TwinProperties {
                desired: Some(desired),
            }),
        }
    }

    /// Desired properties, if any.
    pub fn desired_properties(&self) -> Option<&TwinCollection> {
        self.properties.as_ref().and_then(|p| p.desired.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(value: serde_json::Value) -> TwinCollection {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn serializes_nested_desired_properties() {
        let state = TwinState::new(
            Some(collection(json!({"floor": "3"}))),
            Some(collection(json!({"telemetryInterval": 30}))),
        );
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "tags": {"floor": "3"},
                "properties": {"desired": {"telemetryInterval": 30}}
            })
        );
    }

    #[test]
    fn omits_absent_sections() {
        let state = TwinState::new(None, Some(collection(json!({"mode": "eco"}))));
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("tags").is_none(), "absent tags must be omitted");
        assert_eq!(state.desired_properties().unwrap()["mode"], "eco");
    }

    #[test]
    fn deserializes_service_shape() {
        let state: TwinState = serde_json::from_value(json!({
            "tags": {"site": "berlin"},
            "properties": {"desired": {"fw": "1.2.0"}}
        }))
        .unwrap();
        assert_eq!(state.tags.as_ref().unwrap()["site"], "berlin");
        assert_eq!(state.desired_properties().unwrap()["fw"], "1.2.0");
    }
}
