use crate::{Error, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.-]*)\}").expect("static regex"));

/// Values given with `-P key=value`.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse `key=value` arguments. The value may itself contain `=`.
    pub fn from_args(args: &[String]) -> Result<Self> {
        args.iter().try_fold(Self::new(), |params, arg| {
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                Error::Config(format!("invalid param '{}', expected key=value", arg))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::Config(format!("invalid param '{}', empty key", arg)));
            }
            Ok(params.set(key, value))
        })
    }
}

/// A `params:` entry in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamDef {
    #[serde(default)]
    pub required: bool,
    pub default: Option<String>,
    pub description: Option<String>,
}

/// Replace every `${name}` in `template`.
///
/// Given params win over defaults. A required param with neither is an
/// error; an optional one becomes empty. Names with no definition and no
/// value are left untouched.
pub fn substitute(
    template: &str,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<String> {
    let mut missing = None;
    let out = PLACEHOLDER_RE.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        if let Some(v) = params.get(name) {
            return v.to_string();
        }
        match defs.get(name) {
            Some(def) => match (&def.default, def.required) {
                (Some(default), _) => default.clone(),
                (None, true) => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
                (None, false) => String::new(),
            },
            None => caps[0].to_string(),
        }
    });

    match missing {
        Some(name) => Err(Error::Config(format!("missing required parameter: {}", name))),
        None => Ok(out.into_owned()),
    }
}

/// Substitute inside every string of a YAML tree. Mapping keys are left alone.
pub fn substitute_value(
    value: &mut serde_yaml::Value,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<()> {
    use serde_yaml::Value;
    match value {
        Value::String(s) => *s = substitute(s, params, defs)?,
        Value::Mapping(map) => map
            .values_mut()
            .try_for_each(|v| substitute_value(v, params, defs))?,
        Value::Sequence(seq) => seq
            .iter_mut()
            .try_for_each(|v| substitute_value(v, params, defs))?,
        Value::Tagged(tagged) => substitute_value(&mut tagged.value, params, defs)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(entries: &[(&str, bool, Option<&str>)]) -> HashMap<String, ParamDef> {
        entries
            .iter()
            .map(|(name, required, default)| {
                (
                    name.to_string(),
                    ParamDef {
                        required: *required,
                        default: default.map(String::from),
                        description: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn given_values_replace_placeholders() {
        let params = Params::new().set("env", "staging").set("port", "8080");
        let out = substitute("https://${env}.shop.test:${port}/", &params, &HashMap::new()).unwrap();
        assert_eq!(out, "https://staging.shop.test:8080/");
    }

    #[test]
    fn defaults_and_optional_params() {
        let d = defs(&[("env", false, Some("qa")), ("suffix", false, None)]);
        let out = substitute("${env}-${suffix}!", &Params::new(), &d).unwrap();
        assert_eq!(out, "qa-!");

        let given = Params::new().set("env", "prod");
        assert_eq!(substitute("${env}", &given, &d).unwrap(), "prod");
    }

    #[test]
    fn missing_required_param_is_an_error() {
        let d = defs(&[("password", true, None)]);
        let err = substitute("${password}", &Params::new(), &d).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        let out = substitute("${HOME}/x and {{email}}", &Params::new(), &HashMap::new()).unwrap();
        assert_eq!(out, "${HOME}/x and {{email}}");
    }

    #[test]
    fn substitutes_nested_yaml() {
        let mut value: serde_yaml::Value =
            serde_yaml::from_str("crawl:\n  auth_routes: ['/${area}/a', '/b']\nport: 3000\n").unwrap();
        substitute_value(&mut value, &Params::new().set("area", "team"), &HashMap::new()).unwrap();
        assert_eq!(value["crawl"]["auth_routes"][0].as_str(), Some("/team/a"));
        assert_eq!(value["port"].as_u64(), Some(3000));
    }

    #[test]
    fn args_parse() {
        let args = vec!["user=alice".to_string(), "token=a=b".to_string()];
        let params = Params::from_args(&args).unwrap();
        assert_eq!(params.get("user"), Some("alice"));
        assert_eq!(params.get("token"), Some("a=b"));

        assert!(Params::from_args(&["novalue".to_string()]).is_err());
        assert!(Params::from_args(&["=x".to_string()]).is_err());
    }
}
