//! Template expression evaluation.
//!
//! Scalars are evaluated with minijinja. Two environments share one setup
//! and differ only in how unresolved variables behave:
//!
//! - [`Mode::Strict`]: an unresolved variable is an error.
//! - [`Mode::Permissive`]: an unresolved variable renders as its own
//!   placeholder (`{{ name }}`), so a later pass can still resolve it.
//!
//! Additions over stock minijinja:
//!
//! - filter `quote`: escape a value for a POSIX shell
//! - test `contains`: `where is contains(what)`, the reverse of `in`
//! - `{% include %}` paths are relative to the including template and may
//!   leave the template directory (`../common/x.j2`)

use minijinja::value::{Enumerator, Object, ObjectRepr, Value as JinjaValue};
use minijinja::{AutoEscape, Environment, Error as JinjaError, ErrorKind, UndefinedBehavior};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Global names a permissive scope must never shadow with placeholders.
const RESERVED_GLOBALS: &[&str] = &["range", "dict", "namespace", "debug", "loop", "self"];

/// How unresolved variable references are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Permissive,
}

/// Variables visible to one render.
///
/// Cheap to clone; the bindings are shared.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: Arc<Map<String, Value>>,
}

impl Scope {
    pub fn new(vars: Map<String, Value>) -> Self {
        Self {
            vars: Arc::new(vars),
        }
    }

    /// Build a scope from a document; non-mapping documents bind nothing.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map.clone()),
            _ => Self::default(),
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// The template engine: a strict and a permissive minijinja environment.
pub struct Engine {
    strict: Environment<'static>,
    permissive: Environment<'static>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine without a template directory; `{% include %}` always fails.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Engine resolving `{% include %}` against `template_dir`.
    pub fn with_template_dir(template_dir: &Path) -> Self {
        Self::build(Some(template_dir.to_path_buf()))
    }

    fn build(template_dir: Option<PathBuf>) -> Self {
        Self {
            strict: environment(template_dir.clone(), UndefinedBehavior::Strict),
            permissive: environment(template_dir, UndefinedBehavior::Lenient),
        }
    }

    /// Evaluate one template expression.
    ///
    /// `name` identifies the template for include resolution and error
    /// reporting; it should be the template file name.
    pub fn render_str(
        &self,
        name: &str,
        source: &str,
        scope: &Scope,
        mode: Mode,
    ) -> Result<String, JinjaError> {
        let (env, permissive) = match mode {
            Mode::Strict => (&self.strict, false),
            Mode::Permissive => (&self.permissive, true),
        };
        let ctx = JinjaValue::from_object(ScopeObject {
            vars: Arc::clone(&scope.vars),
            permissive,
        });
        env.render_named_str(name, source, ctx)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn environment(template_dir: Option<PathBuf>, undefined: UndefinedBehavior) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(undefined);
    // Template names end in `.yaml`; output is never escaped.
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_filter("quote", quote_filter);
    env.add_test("contains", contains_test);
    if matches!(undefined, UndefinedBehavior::Lenient) {
        // Placeholders print like their reference but count as undefined.
        env.add_filter("default", default_filter);
        env.add_filter("d", default_filter);
        env.add_test("defined", is_defined);
        env.add_test("undefined", is_undefined);
    }
    if let Some(dir) = template_dir {
        env.set_loader(move |name: &str| load_template(&dir, name));
        env.set_path_join_callback(join_relative);
    }
    env
}

fn quote_filter(value: JinjaValue) -> String {
    match value.as_str() {
        Some(s) => shell_words::quote(s).into_owned(),
        None => shell_words::quote(&value.to_string()).into_owned(),
    }
}

fn contains_test(haystack: JinjaValue, needle: JinjaValue) -> bool {
    if let (Some(h), Some(n)) = (haystack.as_str(), needle.as_str()) {
        return h.contains(n);
    }
    match haystack.try_iter() {
        Ok(mut items) => items.any(|item| item == needle),
        Err(_) => false,
    }
}

fn is_unresolved(value: &JinjaValue) -> bool {
    value.is_undefined() || value.downcast_object_ref::<Placeholder>().is_some()
}

fn default_filter(value: JinjaValue, other: Option<JinjaValue>, lax: Option<bool>) -> JinjaValue {
    if is_unresolved(&value) || (lax.unwrap_or(false) && !value.is_true()) {
        other.unwrap_or_else(|| JinjaValue::from(""))
    } else {
        value
    }
}

fn is_defined(value: JinjaValue) -> bool {
    !is_unresolved(&value)
}

fn is_undefined(value: JinjaValue) -> bool {
    is_unresolved(&value)
}

fn load_template(dir: &Path, name: &str) -> Result<Option<String>, JinjaError> {
    match std::fs::read_to_string(dir.join(name)) {
        Ok(source) => Ok(Some(source)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(JinjaError::new(
            ErrorKind::InvalidOperation,
            format!("could not read template '{}'", name),
        )
        .with_source(err)),
    }
}

fn join_relative<'s>(name: &'s str, parent: &'s str) -> Cow<'s, str> {
    if name.starts_with('/') {
        return Cow::Borrowed(name);
    }
    match parent.rsplit_once('/') {
        Some((dir, _)) => Cow::Owned(format!("{}/{}", dir, name)),
        None => Cow::Borrowed(name),
    }
}

/// Root context object; looks bindings up lazily.
#[derive(Debug)]
struct ScopeObject {
    vars: Arc<Map<String, Value>>,
    permissive: bool,
}

impl Object for ScopeObject {
    fn get_value(self: &Arc<Self>, key: &JinjaValue) -> Option<JinjaValue> {
        let name = key.as_str()?;
        match self.vars.get(name) {
            Some(value) => Some(JinjaValue::from_serialize(value)),
            None if self.permissive && !RESERVED_GLOBALS.contains(&name) => {
                Some(JinjaValue::from_object(Placeholder(name.to_string())))
            }
            None => None,
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(
            self.vars
                .keys()
                .map(|k| JinjaValue::from(k.as_str()))
                .collect(),
        )
    }
}

/// Stand-in for an unresolved variable in permissive mode.
///
/// Renders as `{{ name }}` but is falsy and fails `is defined`.
#[derive(Debug)]
struct Placeholder(String);

impl Object for Placeholder {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &JinjaValue) -> Option<JinjaValue> {
        Some(JinjaValue::from_object(Placeholder(format!(
            "{}.{}",
            self.0, key
        ))))
    }

    fn is_true(self: &Arc<Self>) -> bool {
        false
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result
    where
        Self: Sized + 'static,
    {
        write!(f, "{{{{ {} }}}}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn scope(value: Value) -> Scope {
        Scope::from_value(&value)
    }

    #[test]
    fn substitutes_variables() {
        let engine = Engine::new();
        let out = engine
            .render_str("t", "Hello {{ name }}", &scope(json!({"name": "Alice"})), Mode::Strict)
            .unwrap();
        assert_eq!(out, "Hello Alice");
    }

    #[test]
    fn strict_mode_rejects_unresolved() {
        let engine = Engine::new();
        let err = engine
            .render_str("t", "{{ missing }}", &scope(json!({})), Mode::Strict)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedError);
    }

    #[test]
    fn permissive_mode_keeps_placeholder() {
        let engine = Engine::new();
        let out = engine
            .render_str(
                "t",
                "{{ known }}-{{missing}}-{{ other.attr }}",
                &scope(json!({"known": "k"})),
                Mode::Permissive,
            )
            .unwrap();
        assert_eq!(out, "k-{{ missing }}-{{ other.attr }}");
    }

    #[test]
    fn permissive_mode_keeps_builtin_globals() {
        let engine = Engine::new();
        let out = engine
            .render_str(
                "t",
                "{% for i in range(3) %}{{ i }}{% endfor %}",
                &scope(json!({})),
                Mode::Permissive,
            )
            .unwrap();
        assert_eq!(out, "012");
    }

    #[test]
    fn quote_filter_escapes_for_posix_shell() {
        let engine = Engine::new();
        let out = engine
            .render_str(
                "t",
                "echo {{ msg | quote }}",
                &scope(json!({"msg": "it's here"})),
                Mode::Strict,
            )
            .unwrap();
        assert_eq!(out, "echo 'it'\\''s here'");
    }

    #[test]
    fn contains_test_matches_lists_and_strings() {
        let engine = Engine::new();
        let vars = scope(json!({"envs": ["prod", "stage"], "title": "release notes"}));
        let out = engine
            .render_str(
                "t",
                "{{ envs is contains('prod') }} {{ envs is contains('dev') }} {{ title is contains('notes') }}",
                &vars,
                Mode::Strict,
            )
            .unwrap();
        assert_eq!(out, "true false true");
    }

    #[test]
    fn nested_values_are_reachable() {
        let engine = Engine::new();
        let vars = scope(json!({"release": {"version": "1.2", "hosts": ["a", "b"]}}));
        let out = engine
            .render_str(
                "t",
                "{{ release.version }}:{{ release.hosts | join(',') }}",
                &vars,
                Mode::Strict,
            )
            .unwrap();
        assert_eq!(out, "1.2:a,b");
    }

    #[test]
    fn includes_resolve_relative_to_parent_directory() {
        let root = TempDir::new().unwrap();
        let templates = root.path().join("release");
        let common = root.path().join("common");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::create_dir_all(&common).unwrap();
        std::fs::write(common.join("footer.j2"), "-- {{ team }}").unwrap();

        let engine = Engine::with_template_dir(&templates);
        let out = engine
            .render_str(
                "notify.email.yaml",
                "Bye {% include '../common/footer.j2' %}",
                &scope(json!({"team": "ops"})),
                Mode::Strict,
            )
            .unwrap();
        assert_eq!(out, "Bye -- ops");
    }

    #[test]
    fn syntax_errors_are_reported() {
        let engine = Engine::new();
        let err = engine
            .render_str("t", "{{ unclosed", &scope(json!({})), Mode::Permissive)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
    }
}
