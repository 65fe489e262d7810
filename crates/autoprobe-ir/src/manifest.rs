use crate::UserFlow;
use serde::{Deserialize, Serialize};

/// One runnable test: a flow plus scheduling metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub flow: UserFlow,
    /// Generated source file; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TestCase {
    /// Test for a flow taken straight from a discovery report.
    pub fn from_flow(flow: &UserFlow) -> Self {
        let dependencies = if flow.requires_auth() {
            vec!["auth".to_string()]
        } else {
            Vec::new()
        };
        Self {
            id: slug(&flow.name),
            name: flow.name.clone(),
            flow: flow.clone(),
            file_path: None,
            dependencies,
            tags: flow.tags.clone(),
        }
    }
}

/// Flat list of tests written by the generator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    pub tests: Vec<TestCase>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestShape {
    Wrapped(TestManifest),
    Bare(Vec<TestCase>),
}

impl TestManifest {
    /// Parse a manifest; a bare JSON array of tests is accepted too.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(match serde_json::from_str::<ManifestShape>(json)? {
            ManifestShape::Wrapped(m) => m,
            ManifestShape::Bare(tests) => Self {
                generated_at: None,
                tests,
            },
        })
    }

    pub fn from_flows(flows: &[UserFlow]) -> Self {
        let mut tests: Vec<TestCase> = Vec::with_capacity(flows.len());
        for flow in flows {
            let mut case = TestCase::from_flow(flow);
            let base = case.id.clone();
            let mut n = 2;
            while tests.iter().any(|t| t.id == case.id) {
                case.id = format!("{}-{}", base, n);
                n += 1;
            }
            tests.push(case);
        }
        Self {
            generated_at: None,
            tests,
        }
    }
}

/// Lowercase, alphanumerics kept, everything else collapsed to single dashes.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("flow");
    }
    out
}
