use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rango cerrado `[lower, upper]` de fechas que acepta una recolección.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    #[serde(alias = "start")]
    pub lower: NaiveDate,
    #[serde(alias = "end")]
    pub upper: NaiveDate,
}

/// Dónde cae una fecha respecto de la ventana.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Más nueva que `upper`: se saltea y se sigue.
    Newer,
    Accept,
    /// Más vieja que `lower`: termina el recorrido.
    Older,
}

impl Window {
    pub fn new(lower: NaiveDate, upper: NaiveDate) -> Result<Self> {
        let w = Self { lower, upper };
        w.validate()?;
        Ok(w)
    }

    /// Semana previa: termina ayer, empieza hace 8 días.
    pub fn trailing_week(today: NaiveDate) -> Self {
        Self {
            lower: today - Duration::days(8),
            upper: today - Duration::days(1),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lower > self.upper {
            return Err(Error::invalid_config(format!(
                "ventana invertida: {} > {}",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    pub fn classify(&self, date: NaiveDate) -> Placement {
        if date > self.upper {
            Placement::Newer
        } else if date < self.lower {
            Placement::Older
        } else {
            Placement::Accept
        }
    }

    /// Nombre del directorio de la corrida: "{lower}-{upper}".
    pub fn directory_name(&self) -> String {
        format!(
            "{}-{}",
            self.lower.format("%Y-%m-%d"),
            self.upper.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn classify_respeta_bordes_inclusivos() {
        let w = Window::new(d("2024-01-10"), d("2024-01-17")).unwrap();
        assert_eq!(w.classify(d("2024-01-18")), Placement::Newer);
        assert_eq!(w.classify(d("2024-01-17")), Placement::Accept);
        assert_eq!(w.classify(d("2024-01-10")), Placement::Accept);
        assert_eq!(w.classify(d("2024-01-09")), Placement::Older);
    }

    #[test]
    fn trailing_week_y_directorio() {
        let w = Window::trailing_week(d("2024-01-18"));
        assert_eq!(w.lower, d("2024-01-10"));
        assert_eq!(w.upper, d("2024-01-17"));
        assert_eq!(w.directory_name(), "2024-01-10-2024-01-17");
    }

    #[test]
    fn ventana_invertida_es_invalida() {
        assert!(Window::new(d("2024-01-18"), d("2024-01-10")).is_err());
    }

    #[test]
    fn acepta_alias_start_end_en_json() {
        let w: Window =
            serde_json::from_str(r#"{"start":"2024-01-10","end":"2024-01-17"}"#).unwrap();
        assert_eq!(w.lower, d("2024-01-10"));
    }
}
