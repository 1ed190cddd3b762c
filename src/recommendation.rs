use serde::{Deserialize, Serialize};

use crate::labels::ClassLabel;

pub const LOW_CONFIDENCE: f32 = 0.7;
pub const HIGH_CONFIDENCE: f32 = 0.9;

const LOW_CONFIDENCE_WARNING: &str = "Baja confianza - considerar nueva evaluación";
const ESCALATED_URGENCY: &str = "alta";

/// Hand-authored agronomic guidance for one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Treatment {
    pub diagnosis: &'static str,
    pub treatment: &'static str,
    pub dosage: &'static str,
    pub frequency: &'static str,
    pub prevention: &'static str,
    pub urgency: &'static str,
    pub organic_alternative: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub diagnosis: String,
    pub treatment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevention: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organic_alternative: Option<String>,
    pub confidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub fn treatment_for(label: ClassLabel) -> Treatment {
    match label {
        ClassLabel::Tomato___Bacterial_spot => Treatment {
            diagnosis: "Mancha Bacteriana del Tomate",
            treatment: "Aplicar bactericidas a base de cobre",
            dosage: "2-3 gramos por litro de agua",
            frequency: "Cada 7-10 días",
            prevention: "Rotación de cultivos, usar semillas certificadas",
            urgency: "media_alta",
            organic_alternative: "Extracto de ajo o bicarbonato de sodio (3-4 gramos de sulfato de cobre por litro)",
        },
        ClassLabel::Tomato___Early_blight => Treatment {
            diagnosis: "Tizón Temprano del Tomate",
            treatment: "Fungicidas protectores (Clorotalonil)",
            dosage: "1.5-2 ml por litro de agua",
            frequency: "Cada 10-14 días",
            prevention: "Eliminar restos de cultivo, mejorar ventilación",
            urgency: "media",
            organic_alternative: "Bicarbonato de sodio (1 cucharada por litro)",
        },
        ClassLabel::Tomato___Late_blight => Treatment {
            diagnosis: "Tizón Tardío del Tomate",
            treatment: "Fungicidas sistémicos (Metalaxyl)",
            dosage: "2-2.5 ml por litro de agua",
            frequency: "Cada 5-7 días en condiciones húmedas",
            prevention: "Evitar riego por aspersión, podar hojas bajas",
            urgency: "alta",
            organic_alternative: "Cola de caballo o extracto de canela (4-5 gramos de oxicloruro de cobre por litro)",
        },
        ClassLabel::Tomato___Leaf_Mold => Treatment {
            diagnosis: "Moho de la Hoja del Tomate",
            treatment: "Fungicidas a base de azufre (Azoxistrobina, Tebuconazole)",
            dosage: "2-3 gramos por litro de agua",
            frequency: "Cada 7-10 días",
            prevention: "Mejorar la circulación de aire, evitar el riego por aspersión",
            urgency: "media",
            organic_alternative: "Bicarbonato (Proporcion 1:9), leche diluida (100 ml de leche por litro de agua)",
        },
        ClassLabel::Tomato___Septoria_leaf_spot => Treatment {
            diagnosis: "Mancha de la Septoria",
            treatment: "Clorotalonil, Mancozeb",
            dosage: "2 gramos por litro",
            frequency: "Cada 10 días",
            prevention: "Eliminar hojas infectadas, rotación de cultivos",
            urgency: "Media",
            organic_alternative: "Aceite de neem, extracto de canela (3-5 ml de aceite de neem por litro)",
        },
        ClassLabel::Tomato___Spider_mites => Treatment {
            diagnosis: "Ácaro de Dos Puntos",
            treatment: "Abamectina, Spiromesifen",
            dosage: "0.5-1 ml por litro",
            frequency: "Cada 5-7 días (2-3 aplicaciones)",
            prevention: "Mantener humedad alta, control de malezas",
            urgency: "Alta",
            organic_alternative: "Jabón potásico, aceite de neem (5 ml de jabón potásico + 3 ml aceite neem por litro)",
        },
        ClassLabel::Tomato___Target_Spot => Treatment {
            diagnosis: "Mancha Blanco",
            treatment: "Azoxistrobina, Tebuconazole",
            dosage: "1.5 ml por litro",
            frequency: "Cada 10-12 días",
            prevention: "Eliminar residuos, evitar exceso de nitrógeno",
            urgency: "Media",
            organic_alternative: "Extracto de cola de caballo, bicarbonato (20 gramos de cola de caballo seca por litro)",
        },
        ClassLabel::Tomato___Tomato_Yellow_Leaf_Curl_Virus => Treatment {
            diagnosis: "Virus del Rizado Amarillo",
            treatment: "Imidacloprid (solo para virus)",
            dosage: "0.5 ml por litro para control de mosca",
            frequency: "Aplicaciones preventivas cada 15 días",
            prevention: "Mallas anti-insectos, eliminar plantas infectadas",
            urgency: "Muy Alta",
            organic_alternative: "Aceite de neem para control de vector (5 ml aceite neem por litro)",
        },
        ClassLabel::Tomato___Tomato_mosaic_virus => Treatment {
            diagnosis: "Virus del Mosaico del Tomate",
            treatment: "Elimine las plantas infectadas, para las semillas Fosfato Trisódico",
            dosage: "100 gramos por litro",
            frequency: "Lo antes posible para evitar la propagación",
            prevention: "Semillas certificadas, desinfección de herramientas",
            urgency: "Muy Alta",
            organic_alternative: "Calentar las semillas a 70°C durante 4 días o a 82-85°C durante 24 horas",
        },
        ClassLabel::Tomato___healthy => HEALTHY,
        ClassLabel::Corn___Common_rust => Treatment {
            diagnosis: "Roya Común del Maíz",
            treatment: "Fungicidas triazoles",
            dosage: "0.8-1.2 litros por hectárea",
            frequency: "Aplicar preventivamente",
            prevention: "Usar variedades resistentes, rotación de cultivos",
            urgency: "media",
            organic_alternative: "Bicarbonato de sodio o aceite de neem",
        },
        ClassLabel::Corn___Northern_Leaf_Blight => Treatment {
            diagnosis: "Tizón Norteño de la Hoja del Maíz",
            treatment: "Fungicidas a base de estrobilurinas o triazoles",
            dosage: "0.5-1 litro por hectárea",
            frequency: "Al aparecer las primeras lesiones, repetir a los 14 días",
            prevention: "Híbridos resistentes, rotación de cultivos, incorporar rastrojo",
            urgency: "media_alta",
            organic_alternative: "Extracto de cola de caballo o Bacillus subtilis (10 ml por litro)",
        },
        ClassLabel::Corn___healthy => HEALTHY,
        ClassLabel::Potato___Early_blight => Treatment {
            diagnosis: "Tizón Temprano de la Papa",
            treatment: "Fungicidas protectores",
            dosage: "1.5-2 gramos por litro",
            frequency: "Cada 10-12 días",
            prevention: "Eliminar tubérculos infectados",
            urgency: "media",
            organic_alternative: "Extracto de cola de caballo",
        },
        ClassLabel::Potato___Late_blight => Treatment {
            diagnosis: "Tizón Tardío de la Papa",
            treatment: "Fungicidas sistémicos (Metalaxyl + Mancozeb)",
            dosage: "2.5 gramos por litro de agua",
            frequency: "Cada 5-7 días en condiciones húmedas",
            prevention: "Semilla certificada, aporque alto, destruir plantas voluntarias",
            urgency: "alta",
            organic_alternative: "Caldo bordelés (10 gramos de sulfato de cobre + 10 gramos de cal por litro)",
        },
        ClassLabel::Potato___healthy => HEALTHY,
    }
}

const HEALTHY: Treatment = Treatment {
    diagnosis: "Planta Saludable",
    treatment: "Mantenimiento preventivo",
    dosage: "No requiere tratamiento",
    frequency: "Monitoreo semanal",
    prevention: "Continuar con buenas prácticas agrícolas",
    urgency: "ninguna",
    organic_alternative: "Continuar con prácticas orgánicas",
};

pub fn format_confidence(confidence: f32) -> String {
    format!("{:.2}%", confidence * 100.0)
}

/// Maps a predicted label and its confidence to treatment advice.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        RecommendationEngine
    }

    /// Labels outside the known set get the generic "consult a specialist"
    /// record.
    pub fn recommend(&self, label: &str, confidence: f32) -> RecommendationRecord {
        match label.parse::<ClassLabel>() {
            Ok(label) => self.recommend_label(label, confidence),
            Err(_) => RecommendationRecord {
                diagnosis: "Enfermedad no identificada".to_string(),
                treatment: "Consultar con especialista agrícola".to_string(),
                dosage: None,
                frequency: None,
                prevention: None,
                urgency: None,
                organic_alternative: None,
                confidence: format_confidence(confidence),
                warning: Some(
                    "No se encontró recomendación específica para esta enfermedad".to_string(),
                ),
            },
        }
    }

    pub fn recommend_label(&self, label: ClassLabel, confidence: f32) -> RecommendationRecord {
        let t = treatment_for(label);

        let mut record = RecommendationRecord {
            diagnosis: t.diagnosis.to_string(),
            treatment: t.treatment.to_string(),
            dosage: Some(t.dosage.to_string()),
            frequency: Some(t.frequency.to_string()),
            prevention: Some(t.prevention.to_string()),
            urgency: Some(t.urgency.to_string()),
            organic_alternative: Some(t.organic_alternative.to_string()),
            confidence: format_confidence(confidence),
            warning: None,
        };

        if confidence < LOW_CONFIDENCE {
            record.warning = Some(LOW_CONFIDENCE_WARNING.to_string());
        } else if confidence > HIGH_CONFIDENCE {
            record.urgency = Some(ESCALATED_URGENCY.to_string());
        }

        record
    }
}
