//! User-facing element locators
//!
//! Elements are found the way a person finds them: by accessible role and
//! name, by the text of their label, by visible text. CSS selectors remain
//! available as an escape hatch. Each locator renders to a Playwright
//! JavaScript expression.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ARIA roles accepted by `getByRole`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AriaRole {
    Alert,
    Button,
    Cell,
    Checkbox,
    Combobox,
    Dialog,
    Heading,
    Img,
    Link,
    Listitem,
    Main,
    Menuitem,
    Navigation,
    Option,
    Row,
    Tab,
    Textbox,
}

impl AriaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AriaRole::Alert => "alert",
            AriaRole::Button => "button",
            AriaRole::Cell => "cell",
            AriaRole::Checkbox => "checkbox",
            AriaRole::Combobox => "combobox",
            AriaRole::Dialog => "dialog",
            AriaRole::Heading => "heading",
            AriaRole::Img => "img",
            AriaRole::Link => "link",
            AriaRole::Listitem => "listitem",
            AriaRole::Main => "main",
            AriaRole::Menuitem => "menuitem",
            AriaRole::Navigation => "navigation",
            AriaRole::Option => "option",
            AriaRole::Row => "row",
            AriaRole::Tab => "tab",
            AriaRole::Textbox => "textbox",
        }
    }
}

/// How to find an element on the page.
///
/// In YAML the variant is picked by its key: `{ role: button, name: Войти }`,
/// `{ label: "Логин:" }`, `{ css: "#login" }`. Variant order matters for the
/// untagged match, so `role` is tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    Role {
        role: AriaRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        exact: bool,
    },
    Label {
        label: String,
        #[serde(default)]
        exact: bool,
    },
    Placeholder {
        placeholder: String,
        #[serde(default)]
        exact: bool,
    },
    Text {
        text: String,
        #[serde(default)]
        exact: bool,
    },
    TestId {
        test_id: String,
    },
    Css {
        css: String,
    },
}

impl Locator {
    pub fn role(role: AriaRole, name: impl Into<String>) -> Self {
        Locator::Role {
            role,
            name: Some(name.into()),
            exact: false,
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Locator::Label {
            label: label.into(),
            exact: false,
        }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Locator::Css { css: css.into() }
    }

    /// Render as a Playwright expression rooted at `page_var`.
    pub fn to_js(&self, page_var: &str) -> String {
        match self {
            Locator::Role { role, name, exact } => {
                let mut opts = Vec::new();
                if let Some(name) = name {
                    opts.push(format!("name: {}", js_str(name)));
                }
                if *exact {
                    opts.push("exact: true".to_string());
                }
                if opts.is_empty() {
                    format!("{}.getByRole({})", page_var, js_str(role.as_str()))
                } else {
                    format!(
                        "{}.getByRole({}, {{ {} }})",
                        page_var,
                        js_str(role.as_str()),
                        opts.join(", ")
                    )
                }
            }
            Locator::Label { label, exact } => {
                format!("{}.getByLabel({}{})", page_var, js_str(label), exact_opt(*exact))
            }
            Locator::Placeholder { placeholder, exact } => format!(
                "{}.getByPlaceholder({}{})",
                page_var,
                js_str(placeholder),
                exact_opt(*exact)
            ),
            Locator::Text { text, exact } => {
                format!("{}.getByText({}{})", page_var, js_str(text), exact_opt(*exact))
            }
            Locator::TestId { test_id } => format!("{}.getByTestId({})", page_var, js_str(test_id)),
            Locator::Css { css } => format!("{}.locator({})", page_var, js_str(css)),
        }
    }
}

fn exact_opt(exact: bool) -> &'static str {
    if exact {
        ", { exact: true }"
    } else {
        ""
    }
}

/// Quote a string as a JavaScript literal.
///
/// JSON string syntax is a subset of JS string syntax, so this is safe for
/// quotes, backslashes and non-ASCII text.
pub fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Role { role, name: Some(name), .. } => write!(f, "{} {:?}", role.as_str(), name),
            Locator::Role { role, name: None, .. } => write!(f, "{}", role.as_str()),
            Locator::Label { label, .. } => write!(f, "label {:?}", label),
            Locator::Placeholder { placeholder, .. } => write!(f, "placeholder {:?}", placeholder),
            Locator::Text { text, .. } => write!(f, "text {:?}", text),
            Locator::TestId { test_id } => write!(f, "test-id {:?}", test_id),
            Locator::Css { css } => write!(f, "css {:?}", css),
        }
    }
}
