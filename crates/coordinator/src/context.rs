use crate::config::{PolicyConfig, PolicyThresholds, StrategyTier};
use crate::detector::{NoopDetector, StuckDetector};
use crate::intent::IntentMode;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use theme_protocol::{FileRecord, FileType};

/// Read-only inputs of one execution.
#[derive(Clone)]
pub struct CoordinatorContext {
    pub request: String,
    pub intent: IntentMode,
    /// Project files known to the caller; content may be stubbed
    pub files: Vec<FileRecord>,
    /// Paths chosen by the context engine, most relevant first
    pub selected: Vec<String>,
    pub tier: StrategyTier,
    pub thresholds: PolicyThresholds,
    pub detector: Arc<dyn StuckDetector>,
    /// The user already approved destructive actions for this execution
    pub user_confirmed: bool,
}

impl fmt::Debug for CoordinatorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorContext")
            .field("request", &self.request)
            .field("intent", &self.intent)
            .field("files", &self.files.len())
            .field("selected", &self.selected)
            .field("tier", &self.tier)
            .field("user_confirmed", &self.user_confirmed)
            .finish_non_exhaustive()
    }
}

impl CoordinatorContext {
    pub fn new(request: impl Into<String>, files: Vec<FileRecord>, config: &PolicyConfig) -> Self {
        let request = request.into();
        Self {
            intent: IntentMode::classify(&request),
            request,
            files,
            selected: Vec::new(),
            tier: config.tier,
            thresholds: config.thresholds().clone(),
            detector: Arc::new(NoopDetector),
            user_confirmed: false,
        }
    }

    #[must_use]
    pub fn with_intent(mut self, intent: IntentMode) -> Self {
        self.intent = intent;
        self
    }

    #[must_use]
    pub fn with_selected(mut self, selected: Vec<String>) -> Self {
        self.selected = selected;
        self
    }

    #[must_use]
    pub fn with_detector(mut self, detector: Arc<dyn StuckDetector>) -> Self {
        self.detector = detector;
        self
    }

    #[must_use]
    pub fn with_confirmation(mut self, confirmed: bool) -> Self {
        self.user_confirmed = confirmed;
        self
    }

    pub fn is_code(&self) -> bool {
        self.intent == IntentMode::Code
    }

    /// Files named in the request by path or file name, in order of first
    /// appearance.
    pub fn mentioned_files(&self) -> Vec<&FileRecord> {
        let request = self.request.to_lowercase();
        let mut found: Vec<(usize, &FileRecord)> = self
            .files
            .iter()
            .filter_map(|file| {
                let by_path = request.find(&file.path.to_lowercase());
                let by_name = request.find(&file.name.to_lowercase());
                by_path.or(by_name).map(|pos| (pos, file))
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.path.cmp(&b.1.path)));
        found.into_iter().map(|(_, file)| file).collect()
    }

    /// File type categories the request implies will be edited.
    pub fn expected_categories(&self) -> BTreeSet<FileType> {
        self.mentioned_files()
            .into_iter()
            .map(|file| file.file_type)
            .collect()
    }

    /// The file an execution most likely has to touch.
    pub fn primary_target(&self) -> Option<&str> {
        self.mentioned_files()
            .first()
            .map(|file| file.path.as_str())
            .or_else(|| self.selected.first().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn files() -> Vec<FileRecord> {
        vec![
            FileRecord::new("1", "sections/header.liquid", ""),
            FileRecord::new("2", "assets/base.css", ""),
            FileRecord::new("3", "sections/footer.liquid", ""),
        ]
    }

    #[test]
    fn test_mentions_in_request_order() {
        let ctx = CoordinatorContext::new(
            "Update base.css and then header.liquid",
            files(),
            &PolicyConfig::default(),
        );
        let paths: Vec<&str> = ctx.mentioned_files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["assets/base.css", "sections/header.liquid"]);
        assert_eq!(
            ctx.expected_categories(),
            BTreeSet::from([FileType::Template, FileType::Style])
        );
        assert_eq!(ctx.primary_target(), Some("assets/base.css"));
        assert!(ctx.is_code());
    }

    #[test]
    fn test_primary_target_falls_back_to_selection() {
        let ctx = CoordinatorContext::new("make the logo bigger", files(), &PolicyConfig::default())
            .with_selected(vec!["sections/header.liquid".to_string()]);
        assert!(ctx.expected_categories().is_empty());
        assert_eq!(ctx.primary_target(), Some("sections/header.liquid"));
    }
}
