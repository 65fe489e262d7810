use autoprobe_ir::{
    Action, Assertion, AssertionKind, DiscoveredForm, DiscoveredPage, ElementType, FieldKind,
    Locator, Priority, StrategyKind, UserFlow, WaitCondition,
};

/// Flows worth testing on the crawled pages.
///
/// One submit flow per form that has a submit button, plus a sign-in flow when
/// any crawled path contains `auth`.
pub fn suggest_flows(pages: &[DiscoveredPage]) -> Vec<UserFlow> {
    let mut flows: Vec<UserFlow> = pages
        .iter()
        .flat_map(|page| {
            page.forms
                .iter()
                .enumerate()
                .filter_map(move |(i, form)| form_flow(page, i, form))
        })
        .collect();

    if let Some(page) = pages.iter().find(|p| p.path.contains("auth")) {
        flows.push(sign_in_flow(&page.path));
    }
    flows
}

fn form_label(page: &DiscoveredPage, index: usize, form: &DiscoveredForm) -> String {
    let el = &form.element;
    el.aria_label
        .clone()
        .or_else(|| el.name.clone())
        .or_else(|| el.attributes.get("id").cloned())
        .unwrap_or_else(|| {
            if index == 0 {
                format!("{} form", page.path)
            } else {
                format!("{} form {}", page.path, index + 1)
            }
        })
}

fn form_flow(page: &DiscoveredPage, index: usize, form: &DiscoveredForm) -> Option<UserFlow> {
    let submit = form.submit_button.as_ref()?;
    let label = form_label(page, index, form);

    let mut flow = UserFlow::new(format!("Submit {} on {}", label, page.path));
    flow.description = format!("Fill and submit the {} form on {}", label, page.url);
    flow.expected_outcome = "The form submits without errors".into();
    flow.tags = vec!["form".into()];
    if page.requires_auth {
        flow.preconditions.push("User is authenticated".into());
    }
    if form
        .fields
        .iter()
        .any(|f| f.input_type == Some(FieldKind::Password))
    {
        flow.priority = Priority::High;
    }

    flow.push(Action::Navigate, format!("Open {}", page.path)).value = Some(page.path.clone());

    for field in &form.fields {
        let name = field.locator.description.clone();
        let step = match field.element_type {
            ElementType::Checkbox => flow.push(Action::Check, format!("Check {}", name)),
            ElementType::Radio => flow.push(Action::Click, format!("Choose {}", name)),
            ElementType::Select => {
                // no option list is recorded; keep whatever is preselected
                let Some(value) = field.value.clone() else {
                    continue;
                };
                let step = flow.push(Action::Select, format!("Select {}", name));
                step.value = Some(value);
                step
            }
            _ => {
                let kind = field.input_type.unwrap_or(FieldKind::Text);
                let step = flow.push(Action::Fill, format!("Fill {}", name));
                step.value = Some(format!("{{{{{}}}}}", kind.name()));
                step
            }
        };
        step.target = Some(field.locator.clone());
    }

    let click = flow.push(Action::Click, format!("Submit {}", label));
    click.target = Some(submit.locator.clone());
    click.wait_for = Some(WaitCondition::network_idle());

    Some(flow)
}

fn sign_in_flow(path: &str) -> UserFlow {
    let email = Locator::css("input[type=\"email\"]")
        .with_fallbacks(vec![
            "input[name=\"email\"]".into(),
            "#email".into(),
            "label=Email".into(),
        ])
        .with_description("Email");
    let password = Locator::css("input[type=\"password\"]")
        .with_fallbacks(vec!["input[name=\"password\"]".into(), "#password".into()])
        .with_description("Password");
    let submit = Locator::new("role=button[name=\"Sign in\"]", StrategyKind::Role, 0.9)
        .with_fallbacks(vec![
            "button[type=\"submit\"]".into(),
            "input[type=\"submit\"]".into(),
            "text=log in".into(),
        ])
        .with_description("Sign in");

    let mut flow = UserFlow::new("Sign in");
    flow.description = "Sign in with valid credentials".into();
    flow.expected_outcome = "User lands on an authenticated page".into();
    flow.priority = Priority::Critical;
    flow.tags = vec!["auth".into(), "smoke".into()];

    flow.push(Action::Navigate, format!("Open {}", path)).value = Some(path.to_string());
    let step = flow.push(Action::Fill, "Enter email");
    step.target = Some(email);
    step.value = Some("{{email}}".into());
    let step = flow.push(Action::Fill, "Enter password");
    step.target = Some(password.clone());
    step.value = Some("{{password}}".into());
    let step = flow.push(Action::Click, "Submit credentials");
    step.target = Some(submit);
    step.wait_for = Some(WaitCondition::network_idle());
    step.assertions.push(Assertion {
        kind: AssertionKind::Hidden,
        target: Some(password),
        expected: None,
        timeout: Some(10_000),
    });
    flow
}
