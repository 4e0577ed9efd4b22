use scraper::{ElementRef, Html, Selector};

/// The sign-in form scraped from the portal landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Raw `action` attribute; may be relative to the page it came from.
    pub action: String,
    /// `name`/`value` pairs of the form's hidden inputs, in document order.
    pub hidden: Vec<(String, String)>,
}

impl LoginForm {
    /// Sign-in parameters: credentials and `create=0`, then every hidden field.
    ///
    /// A hidden field reusing an earlier name replaces that value in place.
    pub fn params(&self, email: &str, password: &str) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("email".into(), email.into()),
            ("password".into(), password.into()),
            ("create".into(), "0".into()),
        ];
        for (name, value) in &self.hidden {
            match params.iter_mut().find(|(n, _)| n == name) {
                Some(existing) => existing.1 = value.clone(),
                None => params.push((name.clone(), value.clone())),
            }
        }
        params
    }
}

/// Find the first `<form>` in the page and collect its action and hidden inputs.
///
/// Returns `None` when the page has no form or the form has no `action`.
pub fn parse_login_form(html: &str) -> Option<LoginForm> {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").ok()?;
    let input_selector = Selector::parse("input").ok()?;

    let form = document.select(&form_selector).next()?;
    let action = form.value().attr("action")?.to_string();

    let hidden = form
        .select(&input_selector)
        .filter(is_hidden)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Some(LoginForm { action, hidden })
}

fn is_hidden(input: &ElementRef<'_>) -> bool {
    input
        .value()
        .attr("type")
        .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
}
