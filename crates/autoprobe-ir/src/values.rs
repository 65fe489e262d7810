use crate::FieldKind;
use std::collections::HashMap;

/// Resolves `{{kind}}` placeholders in step values to sample data.
#[derive(Debug, Clone, Default)]
pub struct ValueGenerator {
    overrides: HashMap<String, String>,
}

impl ValueGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `value` for `{{key}}` instead of the built-in sample.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Built-in sample for a field kind.
    pub fn sample(kind: FieldKind) -> &'static str {
        match kind {
            FieldKind::Email => "autoprobe.user@example.com",
            FieldKind::Password => "Autoprobe#2024",
            FieldKind::Phone => "+1 555 010 0199",
            FieldKind::Url => "https://example.com",
            FieldKind::Number => "42",
            FieldKind::Date => "2024-01-15",
            FieldKind::Time => "09:30",
            FieldKind::Datetime => "2024-01-15T09:30",
            FieldKind::Search => "test",
            FieldKind::Zip => "94105",
            FieldKind::FirstName => "Alex",
            FieldKind::LastName => "Tester",
            FieldKind::FullName => "Alex Tester",
            FieldKind::Username => "autoprobe_user",
            FieldKind::Company => "Example Corp",
            FieldKind::Address => "1 Market Street",
            FieldKind::City => "San Francisco",
            FieldKind::State => "CA",
            FieldKind::Country => "United States",
            FieldKind::CreditCard => "4242424242424242",
            FieldKind::Cvv => "123",
            FieldKind::CardExpiry => "12/30",
            FieldKind::Age => "30",
            FieldKind::Message => "This is an automated test message.",
            FieldKind::Text => "Test input",
        }
    }

    fn lookup(&self, key: &str) -> String {
        if let Some(v) = self.overrides.get(key) {
            return v.clone();
        }
        FieldKind::parse(key)
            .map(Self::sample)
            .unwrap_or(Self::sample(FieldKind::Text))
            .to_string()
    }

    /// Replace every `{{key}}` in `template`. Text without placeholders is returned as-is.
    pub fn resolve(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            out.push_str(&rest[..start]);
            let key = rest[start + 2..start + 2 + len].trim();
            out.push_str(&self.lookup(key));
            rest = &rest[start + 2 + len + 2..];
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_kinds() {
        let values = ValueGenerator::new();
        assert_eq!(values.resolve("{{email}}"), "autoprobe.user@example.com");
        assert_eq!(values.resolve("zip: {{ zip }}"), "zip: 94105");
    }

    #[test]
    fn unknown_kind_falls_back_to_text() {
        let values = ValueGenerator::new();
        assert_eq!(values.resolve("{{favouriteColour}}"), "Test input");
    }

    #[test]
    fn literals_and_unterminated_placeholders_pass_through() {
        let values = ValueGenerator::new();
        assert_eq!(values.resolve("plain"), "plain");
        assert_eq!(values.resolve("{{email"), "{{email");
    }

    #[test]
    fn overrides_win() {
        let values = ValueGenerator::new().with_override("password", "hunter2");
        assert_eq!(values.resolve("{{password}}"), "hunter2");
        assert_eq!(values.resolve("{{firstName}} {{lastName}}"), "Alex Tester");
    }
}
