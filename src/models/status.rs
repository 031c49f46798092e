use serde::Deserialize;
use serde_json::Value;

/// One status message from the live device stream.
///
/// Both blocks are optional on the wire; which ones are required, and what
/// happens when they are missing, is decided in the bridge rather than in
/// the decoder.
#[derive(Debug, Deserialize)]
pub struct DeviceStatus {
    pub hwc: Option<HwConfig>,
    pub senml: Option<SenmlPack>,
}

/// Hardware configuration block: identifies the reporting device and flags
/// readings the device itself knows are bad.
#[derive(Debug, Deserialize)]
pub struct HwConfig {
    pub deviceid: Option<String>,
    pub error: Option<bool>,
}

/// SenML-style measurement pack: an ordered list of {n, v} readings.
#[derive(Debug, Deserialize)]
pub struct SenmlPack {
    #[serde(rename = "e")]
    pub entries: Option<Vec<SenmlEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct SenmlEntry {
    #[serde(rename = "n")]
    pub name: Option<String>,
    #[serde(rename = "v")]
    pub value: Option<Value>,
}

/// EmonCMS input names cannot contain `/`, which SenML names routinely do.
pub fn sanitize_name(name: &str) -> String {
    name.replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_every_slash() {
        assert_eq!(sanitize_name("L1/power"), "L1_power");
        assert_eq!(sanitize_name("a/b/c"), "a_b_c");
        assert_eq!(sanitize_name("power"), "power");
    }

    #[test]
    fn decodes_full_status_message() {
        let raw = r#"{"hwc":{"deviceid":"dev1"},"senml":{"e":[{"n":"power","v":42}]}}"#;
        let status: DeviceStatus = serde_json::from_str(raw).unwrap();

        let hwc = status.hwc.unwrap();
        assert_eq!(hwc.deviceid.as_deref(), Some("dev1"));
        assert_eq!(hwc.error, None);

        let entries = status.senml.unwrap().entries.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name.as_deref(), Some("power"));
        assert_eq!(entries[0].value, Some(Value::from(42)));
    }

    #[test]
    fn missing_blocks_decode_as_none() {
        let status: DeviceStatus = serde_json::from_str(r#"{"foo": 1}"#).unwrap();
        assert!(status.hwc.is_none());
        assert!(status.senml.is_none());
    }

    #[test]
    fn string_values_are_preserved() {
        let raw = r#"{"senml":{"e":[{"n":"fw","v":"1.2.3"}]}}"#;
        let status: DeviceStatus = serde_json::from_str(raw).unwrap();
        let entries = status.senml.unwrap().entries.unwrap();
        assert_eq!(entries[0].value, Some(Value::from("1.2.3")));
    }
}
