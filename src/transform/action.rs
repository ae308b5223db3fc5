//! Action chain parsing
//!
//! The `action` query parameter is a small pipe/bang/comma language:
//!
//! ```text
//! resize!800,400,1|grayscale|watermark!https://cdn.example.com/logo.png,10,10
//! ```
//!
//! `|` separates steps, `!` separates the operation name from its
//! parameters, `,` separates parameters. Parsing is purely syntactic and
//! never fails; operation names and parameter values are validated when the
//! chain executes.

use std::fmt;

/// One step of an action chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    pub operation: String,
    pub params: Vec<String>,
}

impl PipelineStep {
    pub fn new(operation: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            operation: operation.into(),
            params,
        }
    }

    /// Parse a single `name!p1,p2` segment.
    pub fn parse(segment: &str) -> Self {
        let (operation, options) = segment.split_once('!').unwrap_or((segment, ""));
        let params = if options.is_empty() {
            Vec::new()
        } else {
            options.split(',').map(str::to_string).collect()
        };

        Self {
            operation: operation.to_string(),
            params,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.operation)
        } else {
            write!(f, "{}!{}", self.operation, self.params.join(","))
        }
    }
}

/// Ordered sequence of steps; the empty chain is the identity pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionChain {
    steps: Vec<PipelineStep>,
}

impl ActionChain {
    /// Parse an optional action string. Absent or empty input yields an
    /// empty chain; empty segments (`||`, leading or trailing `|`) are dropped.
    pub fn parse(action: Option<&str>) -> Self {
        let steps = action
            .unwrap_or_default()
            .split('|')
            .filter(|segment| !segment.is_empty())
            .map(PipelineStep::parse)
            .collect();

        Self { steps }
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl From<Vec<PipelineStep>> for ActionChain {
    fn from(steps: Vec<PipelineStep>) -> Self {
        Self { steps }
    }
}

impl<'a> IntoIterator for &'a ActionChain {
    type Item = &'a PipelineStep;
    type IntoIter = std::slice::Iter<'a, PipelineStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_absent_and_empty_action_parse_to_empty_chain() {
        assert!(ActionChain::parse(None).is_empty());
        assert!(ActionChain::parse(Some("")).is_empty());
    }

    #[test]
    fn test_parse_two_steps() {
        let chain = ActionChain::parse(Some("resize!800,400,1|grayscale"));
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain.steps()[0],
            PipelineStep::new("resize", strings(&["800", "400", "1"]))
        );
        assert_eq!(chain.steps()[1], PipelineStep::new("grayscale", vec![]));
    }

    #[test]
    fn test_empty_segments_are_dropped() {
        assert!(ActionChain::parse(Some("||")).is_empty());

        let chain = ActionChain::parse(Some("|invert||fliph|"));
        let names: Vec<_> = chain.steps().iter().map(|s| s.operation.as_str()).collect();
        assert_eq!(names, vec!["invert", "fliph"]);
    }

    #[test]
    fn test_trailing_bang_gives_no_params() {
        let chain = ActionChain::parse(Some("resize!"));
        assert_eq!(chain.steps()[0], PipelineStep::new("resize", vec![]));
    }

    #[test]
    fn test_only_first_bang_splits() {
        let chain = ActionChain::parse(Some("foo!!1,2"));
        assert_eq!(chain.steps()[0].operation, "foo");
        assert_eq!(chain.steps()[0].params, strings(&["!1", "2"]));
    }

    #[test]
    fn test_empty_params_are_kept_positionally() {
        let chain = ActionChain::parse(Some("watermark!,10,10"));
        assert_eq!(chain.steps()[0].params, strings(&["", "10", "10"]));
    }

    #[test]
    fn test_secondary_url_is_first_param() {
        let chain = ActionChain::parse(Some(
            "watermark!https://cdn.example.com/logo.png,10,20",
        ));
        let step = &chain.steps()[0];
        assert_eq!(step.operation, "watermark");
        assert_eq!(step.params[0], "https://cdn.example.com/logo.png");
        assert_eq!(&step.params[1..], &strings(&["10", "20"])[..]);
    }

    #[test]
    fn test_step_display_round_trips_segment() {
        let step = PipelineStep::parse("resize!20,20,5");
        assert_eq!(step.to_string(), "resize!20,20,5");
        assert_eq!(PipelineStep::parse("grayscale").to_string(), "grayscale");
    }
}
