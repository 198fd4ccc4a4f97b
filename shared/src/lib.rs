use serde::{Deserialize, Serialize};
use strum::Display;

/// Label reported for a chest X-ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Diagnosis {
    #[serde(rename = "Normal Lung")]
    #[strum(serialize = "Normal Lung")]
    Normal,
    #[serde(rename = "Pneumonia Detected")]
    #[strum(serialize = "Pneumonia Detected")]
    Pneumonia,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub prediction: Diagnosis,
    /// Raw classifier output for the pneumonia class, whatever the label.
    pub confidence: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnosis_uses_display_labels_on_the_wire() {
        let body = PredictionResponse {
            prediction: Diagnosis::Pneumonia,
            confidence: 0.83,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"prediction":"Pneumonia Detected","confidence":0.83}"#);

        let normal = serde_json::to_value(Diagnosis::Normal).unwrap();
        assert_eq!(normal, serde_json::json!("Normal Lung"));
    }

    #[test]
    fn diagnosis_display_matches_serde() {
        assert_eq!(Diagnosis::Normal.to_string(), "Normal Lung");
        assert_eq!(Diagnosis::Pneumonia.to_string(), "Pneumonia Detected");
        for label in [Diagnosis::Normal, Diagnosis::Pneumonia] {
            let wire = serde_json::to_value(label).unwrap();
            assert_eq!(wire, serde_json::json!(label.to_string()));
        }
    }
}
