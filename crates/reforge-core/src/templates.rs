//! Validator rubrics: name → prompt template.
//!
//! A [`TemplateRegistry`] is an explicit configuration object handed to the
//! validator runner. Live templates take precedence over the built-in
//! fallbacks, and resolved templates are memoized on the registry itself.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, OnceLock};

use regex::{Captures, Regex};

use crate::domain::{ReforgeError, Result, ValidationLevel};

/// String context used to fill template placeholders.
pub type ValidationContext = BTreeMap<String, String>;

/// Placeholders with documented defaults. `{artifact}` and `{level}` are
/// always filled from the call itself.
const PLACEHOLDER_DEFAULTS: [(&str, &str); 4] = [
    ("file_path", "unknown"),
    ("language", "unknown"),
    ("project_name", "project"),
    ("context", ""),
];

const RESPONSE_FORMAT: &str = r#"Respond with ONLY a JSON object, no prose, in this shape:
{
  "status": "PASS" | "WARNING" | "FAIL",
  "score": <number 0-100>,
  "passed_checks": ["<check that passed>", ...],
  "findings": [
    {
      "id": "<stable id>",
      "severity": "CRITICAL" | "HIGH" | "MEDIUM" | "LOW" | "INFO",
      "category": "<category>",
      "subcategory": "<subcategory>",
      "location": "<where in the artifact>",
      "issue": "<what is wrong>",
      "recommendation": "<how to fix it>",
      "fix": "<replacement text, optional>",
      "code_snippet": "<offending excerpt, optional>",
      "references": ["<link or standard>", ...],
      "impact": "<consequence if unfixed>",
      "confidence": <number 0.0-1.0>
    }
  ]
}
Use FAIL when any CRITICAL or HIGH issue exists, WARNING when only MEDIUM issues exist, PASS otherwise."#;

const CODE_RUBRIC: &str = r#"You are a meticulous code reviewer acting as an automated quality gate.
Review the {language} code below from `{file_path}` in project {project_name}.
Review depth: {level}.

Additional context:
{context}

--- BEGIN CODE ---
{artifact}
--- END CODE ---

Evaluate correctness, security, error handling, performance and maintainability.
Report every concrete problem as a finding with an exact location."#;

const DOCUMENTATION_RUBRIC: &str = r#"You are a technical writer reviewing documentation as an automated quality gate.
Review the documentation below for `{file_path}` in project {project_name} ({language}).
Review depth: {level}.

Additional context:
{context}

--- BEGIN DOCUMENTATION ---
{artifact}
--- END DOCUMENTATION ---

Evaluate accuracy, completeness, clarity, structure and working examples.
Report missing sections, misleading statements and broken examples as findings."#;

const TESTS_RUBRIC: &str = r#"You are a test engineer reviewing a test suite as an automated quality gate.
Review the {language} tests below from `{file_path}` in project {project_name}.
Review depth: {level}.

Additional context:
{context}

--- BEGIN TESTS ---
{artifact}
--- END TESTS ---

Evaluate coverage of normal paths, edge cases and error paths, assertion strength,
isolation and determinism. Report untested behaviour and weak assertions as findings."#;

/// Built-in fallback rubrics keyed by validator name.
pub fn builtin_templates() -> HashMap<String, String> {
    [
        ("code", CODE_RUBRIC),
        ("documentation", DOCUMENTATION_RUBRIC),
        ("tests", TESTS_RUBRIC),
    ]
    .into_iter()
    .map(|(name, rubric)| (name.to_string(), format!("{rubric}\n\n{RESPONSE_FORMAT}")))
    .collect()
}

/// Name → template lookup with a fallback map and a memoization cache.
#[derive(Debug)]
pub struct TemplateRegistry {
    templates: HashMap<String, String>,
    fallbacks: HashMap<String, String>,
    cache: Mutex<HashMap<String, Arc<str>>>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    /// Registry with no live templates and the built-in fallbacks.
    pub fn new() -> Self {
        Self::with_fallbacks(builtin_templates())
    }

    pub fn with_fallbacks(fallbacks: HashMap<String, String>) -> Self {
        Self {
            templates: HashMap::new(),
            fallbacks,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Register several live templates at once.
    pub fn with_templates<I, K, V>(mut self, templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, template) in templates {
            self.register(name, template)?;
        }
        Ok(self)
    }

    /// Register or replace a live template.
    ///
    /// The template must reference the artifact via `{artifact}` or `{code}`.
    pub fn register(&mut self, name: impl Into<String>, template: impl Into<String>) -> Result<()> {
        let name = name.into();
        let template = template.into();
        if name.trim().is_empty() {
            return Err(ReforgeError::Template(
                "validator name must not be empty".to_string(),
            ));
        }
        if !template.contains("{artifact}") && !template.contains("{code}") {
            return Err(ReforgeError::Template(format!(
                "template for {name} has no {{artifact}} placeholder"
            )));
        }
        self.cache
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&name);
        self.templates.insert(name, template);
        Ok(())
    }

    /// Resolve `name`: live template, else fallback, else `UnknownValidator`.
    pub fn resolve(&self, name: &str) -> Result<Arc<str>> {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hit) = cache.get(name) {
            return Ok(Arc::clone(hit));
        }

        let template: Arc<str> = match self
            .templates
            .get(name)
            .or_else(|| self.fallbacks.get(name))
        {
            Some(t) => Arc::from(t.as_str()),
            None => return Err(ReforgeError::UnknownValidator(name.to_string())),
        };
        cache.insert(name.to_string(), Arc::clone(&template));
        Ok(template)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name) || self.fallbacks.contains_key(name)
    }

    /// Every resolvable validator name, sorted.
    pub fn validator_names(&self) -> Vec<String> {
        self.templates
            .keys()
            .chain(self.fallbacks.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of memoized templates.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .map(|c| c.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
}

/// Fill `template` with the artifact, level and context.
///
/// Documented placeholders fall back to their defaults when missing from
/// `context`; any other context key `k` fills `{k}`. Unknown placeholders are
/// left as written. Substituted values are never scanned again.
pub fn fill_template(
    template: &str,
    artifact: &str,
    context: &ValidationContext,
    level: ValidationLevel,
) -> String {
    let Some(re) = placeholder_regex() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        match key {
            "artifact" | "code" => artifact.to_string(),
            "level" => level.as_str().to_string(),
            _ => context
                .get(key)
                .map(String::as_str)
                .or_else(|| {
                    PLACEHOLDER_DEFAULTS
                        .iter()
                        .find(|(k, _)| *k == key)
                        .map(|(_, default)| *default)
                })
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string()),
        }
    })
    .into_owned()
}
