//! Display state for a space row.

use std::fmt;

/// What a space row shows next to its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceLabel {
    /// Mirror directory is missing.
    NotInstalled {
        /// Space title.
        title: String,
    },
    /// Installed with no server running.
    Ready {
        /// Space title.
        title: String,
    },
    /// Server is up at `url`.
    Running {
        /// Space title.
        title: String,
        /// Address of the running server.
        url: String,
    },
}

/// Builds the label for a space.
///
/// `url` is ignored when the space is not installed.
#[must_use]
pub fn build_label(title: &str, installed: bool, url: Option<&str>) -> SpaceLabel {
    let title = title.to_string();
    match (installed, url) {
        (false, _) => SpaceLabel::NotInstalled { title },
        (true, Some(url)) => SpaceLabel::Running {
            title,
            url: url.to_string(),
        },
        (true, None) => SpaceLabel::Ready { title },
    }
}

impl SpaceLabel {
    /// Returns the space title.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::NotInstalled { title } | Self::Ready { title } | Self::Running { title, .. } => {
                title
            }
        }
    }

    /// Returns the status text without the title.
    #[must_use]
    pub fn status(&self) -> String {
        match self {
            Self::NotInstalled { .. } => "Not Installed".to_string(),
            Self::Ready { .. } => "Installed, Ready to Launch".to_string(),
            Self::Running { url, .. } => format!("Currently Running: {}", url),
        }
    }

    /// Returns the running URL, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Running { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Renders the label as an HTML fragment.
    #[must_use]
    pub fn to_html(&self) -> String {
        let title = escape_html(self.title());
        match self {
            Self::NotInstalled { .. } => format!(
                r#"<div>{}</div><div style="color: grey;">Not Installed</div>"#,
                title
            ),
            Self::Ready { .. } => format!(
                r#"<div>{}</div><div style="color: grey;">Installed, Ready to Launch</div>"#,
                title
            ),
            Self::Running { url, .. } => {
                let url = escape_html(url);
                format!(
                    r#"<div>{}</div><div style="color: green;">Currently Running: <a href="{url}" style="color: blue;" target="_blank">{url}</a></div>"#,
                    title,
                    url = url
                )
            }
        }
    }
}

impl fmt::Display for SpaceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {}", self.title(), self.status())
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
