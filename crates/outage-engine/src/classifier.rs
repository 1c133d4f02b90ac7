//! Restart reason classification

/// Reason fragments reported by the device after a self-inflicted restart
pub const DEFAULT_TECHNICAL_KEYWORDS: [&str; 5] =
    ["Brownout", "Software Reset", "Watchdog", "Exception", "Panic"];

/// Reported when the device sends no reason
pub const NO_REASON: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartKind {
    /// Device fault: brownout, reset, watchdog, crash
    Technical,
    /// Ordinary power-up or unknown cause
    Normal,
}

/// Decides whether a restart reason points at a device fault.
pub trait RestartClassifier: Send + Sync {
    fn classify(&self, raw_reason: &str) -> RestartKind;
}

/// Case-insensitive substring match against a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TECHNICAL_KEYWORDS)
    }
}

impl RestartClassifier for KeywordClassifier {
    fn classify(&self, raw_reason: &str) -> RestartKind {
        let reason = raw_reason.to_lowercase();
        if self.keywords.iter().any(|k| reason.contains(k.as_str())) {
            RestartKind::Technical
        } else {
            RestartKind::Normal
        }
    }
}

/// Human-readable text for a device reason code. Unknown codes pass through.
pub fn describe_reason(raw_reason: &str) -> String {
    let text = match raw_reason {
        "Power On" => "⚡ Power-up (normal start)",
        "Brownout (Voltage Dip)" => "📉 Voltage dip (lights flickered)",
        "Software Reset" => "🔄 Software restart",
        "Watchdog (Interrupt)" => "⚠️ System fault (WDT)",
        "Watchdog (Task)" => "⚠️ System fault (Task WDT)",
        "Watchdog (Other)" => "⚠️ System fault (Other)",
        "Exception/Panic" => "❌ Critical error (Panic)",
        "Deep Sleep" => "🌙 Wake from sleep",
        "Unknown" => "❓ Unknown cause",
        NO_REASON => "Unknown",
        other => other,
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_fault_codes_are_technical() {
        let classifier = KeywordClassifier::default();
        for raw in [
            "Brownout (Voltage Dip)",
            "Software Reset",
            "Watchdog (Task)",
            "Exception/Panic",
        ] {
            assert_eq!(classifier.classify(raw), RestartKind::Technical, "{}", raw);
        }
    }

    #[test]
    fn test_normal_codes() {
        let classifier = KeywordClassifier::default();
        for raw in ["Power On", "Deep Sleep", "Unknown", "N/A", ""] {
            assert_eq!(classifier.classify(raw), RestartKind::Normal, "{}", raw);
        }
    }

    #[test]
    fn test_match_ignores_case() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify("task watchdog fired"), RestartKind::Technical);
        assert_eq!(classifier.classify("BROWNOUT"), RestartKind::Technical);
    }

    #[test]
    fn test_custom_vocabulary() {
        let classifier = KeywordClassifier::new(["overheat", "  "]);
        assert_eq!(classifier.classify("Overheat shutdown"), RestartKind::Technical);
        assert_eq!(classifier.classify("Brownout"), RestartKind::Normal);
    }

    #[test]
    fn test_describe_reason() {
        assert_eq!(describe_reason("Software Reset"), "🔄 Software restart");
        assert_eq!(describe_reason("N/A"), "Unknown");
        assert_eq!(describe_reason("Cosmic ray"), "Cosmic ray");
    }
}
