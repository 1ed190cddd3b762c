use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Crop health categories, in the order of the classifier's output vector.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLabel {
    Tomato___Bacterial_spot,
    Tomato___Early_blight,
    Tomato___Late_blight,
    Tomato___Leaf_Mold,
    Tomato___Septoria_leaf_spot,
    Tomato___Spider_mites,
    Tomato___Target_Spot,
    Tomato___Tomato_Yellow_Leaf_Curl_Virus,
    Tomato___Tomato_mosaic_virus,
    Tomato___healthy,
    Corn___Common_rust,
    Corn___Northern_Leaf_Blight,
    Corn___healthy,
    Potato___Early_blight,
    Potato___Late_blight,
    Potato___healthy,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 16] = [
        ClassLabel::Tomato___Bacterial_spot,
        ClassLabel::Tomato___Early_blight,
        ClassLabel::Tomato___Late_blight,
        ClassLabel::Tomato___Leaf_Mold,
        ClassLabel::Tomato___Septoria_leaf_spot,
        ClassLabel::Tomato___Spider_mites,
        ClassLabel::Tomato___Target_Spot,
        ClassLabel::Tomato___Tomato_Yellow_Leaf_Curl_Virus,
        ClassLabel::Tomato___Tomato_mosaic_virus,
        ClassLabel::Tomato___healthy,
        ClassLabel::Corn___Common_rust,
        ClassLabel::Corn___Northern_Leaf_Blight,
        ClassLabel::Corn___healthy,
        ClassLabel::Potato___Early_blight,
        ClassLabel::Potato___Late_blight,
        ClassLabel::Potato___healthy,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(self) -> &'static str {
        match self {
            ClassLabel::Tomato___Bacterial_spot => "Tomato___Bacterial_spot",
            ClassLabel::Tomato___Early_blight => "Tomato___Early_blight",
            ClassLabel::Tomato___Late_blight => "Tomato___Late_blight",
            ClassLabel::Tomato___Leaf_Mold => "Tomato___Leaf_Mold",
            ClassLabel::Tomato___Septoria_leaf_spot => "Tomato___Septoria_leaf_spot",
            ClassLabel::Tomato___Spider_mites => "Tomato___Spider_mites",
            ClassLabel::Tomato___Target_Spot => "Tomato___Target_Spot",
            ClassLabel::Tomato___Tomato_Yellow_Leaf_Curl_Virus => {
                "Tomato___Tomato_Yellow_Leaf_Curl_Virus"
            }
            ClassLabel::Tomato___Tomato_mosaic_virus => "Tomato___Tomato_mosaic_virus",
            ClassLabel::Tomato___healthy => "Tomato___healthy",
            ClassLabel::Corn___Common_rust => "Corn___Common_rust",
            ClassLabel::Corn___Northern_Leaf_Blight => "Corn___Northern_Leaf_Blight",
            ClassLabel::Corn___healthy => "Corn___healthy",
            ClassLabel::Potato___Early_blight => "Potato___Early_blight",
            ClassLabel::Potato___Late_blight => "Potato___Late_blight",
            ClassLabel::Potato___healthy => "Potato___healthy",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        // ALL lists the variants in declaration order
        self as usize
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|label| label.as_str()).collect()
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown class label: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for ClassLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}
