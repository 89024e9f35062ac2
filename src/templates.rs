use std::sync::Arc;

use tera::{Context, Tera};

const WELCOME_HTML: &str = "welcome.html";
const WELCOME_TEXT: &str = "welcome.txt";
const UNSUBSCRIBE_SUCCESS: &str = "unsubscribe_success.html";
const UNSUBSCRIBE_ERROR: &str = "unsubscribe_error.html";

/// Compiled templates for outgoing emails and the unsubscribe-link pages.
/// Templates are embedded in the binary; `.html` templates are auto-escaped.
#[derive(Debug, Clone)]
pub struct TemplateManager {
    tera: Arc<Tera>,
    brand: String,
}

impl TemplateManager {
    pub fn new(brand: impl Into<String>) -> tera::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (WELCOME_HTML, include_str!("../templates/welcome.html")),
            (WELCOME_TEXT, include_str!("../templates/welcome.txt")),
            (
                UNSUBSCRIBE_SUCCESS,
                include_str!("../templates/unsubscribe_success.html"),
            ),
            (
                UNSUBSCRIBE_ERROR,
                include_str!("../templates/unsubscribe_error.html"),
            ),
        ])?;

        Ok(Self {
            tera: Arc::new(tera),
            brand: brand.into(),
        })
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    /// Render the welcome email, returns the `(html, text)` bodies
    pub fn welcome_email(&self, email: &str, unsubscribe_url: &str) -> tera::Result<(String, String)> {
        let mut context = self.context();
        context.insert("email", email);
        context.insert("unsubscribe_url", unsubscribe_url);

        let html = self.tera.render(WELCOME_HTML, &context)?;
        let text = self.tera.render(WELCOME_TEXT, &context)?;

        Ok((html, text))
    }

    pub fn unsubscribe_success_page(&self, email: &str) -> tera::Result<String> {
        let mut context = self.context();
        context.insert("email", email);
        self.tera.render(UNSUBSCRIBE_SUCCESS, &context)
    }

    pub fn unsubscribe_error_page(&self, message: &str) -> tera::Result<String> {
        let mut context = self.context();
        context.insert("message", message);
        self.tera.render(UNSUBSCRIBE_ERROR, &context)
    }

    fn context(&self) -> Context {
        let mut context = Context::new();
        context.insert("brand", &self.brand);
        context
    }
}
