use serde::{Deserialize, Serialize};

use crate::classification::domain::classification_client::label_image_path;
use crate::sampling::encoded_image::{EncodeError, EncodedImage};

/// Classify response. Two backend generations exist; both are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassificationResult {
    /// Ranked parts plus a colour guess and the crop the backend classified.
    Extended(ExtendedClassification),
    /// Ranked labels with probabilities on a 0-100 scale.
    Legacy(LegacyClassification),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyClassification {
    pub classes: Vec<LabelScore>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub probability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtendedClassification {
    #[serde(default)]
    pub source_url: Option<String>,
    pub parts: Vec<PartPrediction>,
    #[serde(default)]
    pub color: Option<ColorPrediction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartPrediction {
    pub id: String,
    pub url: String,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorPrediction {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub hex: String,
    pub confidence: f64,
}

/// One line of the result display.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub image_url: String,
}

impl ClassificationResult {
    /// Entries to display, in backend ranking order.
    ///
    /// `min_probability` only applies to legacy responses, which are kept
    /// when `probability > min_probability`.
    pub fn predictions(&self, min_probability: f64) -> Vec<Prediction> {
        match self {
            ClassificationResult::Legacy(legacy) => legacy
                .classes
                .iter()
                .filter(|c| c.probability > min_probability)
                .map(|c| Prediction {
                    label: c.label.clone(),
                    confidence: c.probability,
                    image_url: label_image_path(&c.label),
                })
                .collect(),
            ClassificationResult::Extended(extended) => extended
                .parts
                .iter()
                .map(|p| Prediction {
                    label: p.id.clone(),
                    confidence: p.confidence,
                    image_url: p.url.clone(),
                })
                .collect(),
        }
    }

    pub fn color(&self) -> Option<&ColorPrediction> {
        match self {
            ClassificationResult::Extended(extended) => extended.color.as_ref(),
            ClassificationResult::Legacy(_) => None,
        }
    }

    /// The image the backend actually classified (after its own cropping),
    /// when it sent one back.
    pub fn source_image(&self) -> Option<Result<EncodedImage, EncodeError>> {
        match self {
            ClassificationResult::Extended(ExtendedClassification {
                source_url: Some(url),
                ..
            }) => Some(EncodedImage::from_data_url(url)),
            _ => None,
        }
    }
}
