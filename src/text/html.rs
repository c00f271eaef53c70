//! HTML-to-text normalization for job posting pages.
//!
//! # Design Decisions
//! - Chrome elements (script, style, nav, header, footer, aside,
//!   noscript) carry no posting content and are dropped subtree-and-all
//! - Images surface through their accessible label; decorative images
//!   (aria-hidden, presentation roles) are silent
//! - Pure function over the parsed tree; no shared state

use ego_tree::NodeRef;
use scraper::node::Element;
use scraper::{Html, Node};

const SKIPPED_CONTAINERS: [&str; 7] = [
    "script", "style", "nav", "header", "footer", "aside", "noscript",
];

/// Strip markup down to the visible, accessible text with whitespace
/// runs collapsed to single spaces.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    collect_text(document.tree.root(), &mut out);
    collapse_whitespace(&out)
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(&text);
            out.push(' ');
        }
        Node::Element(element) => {
            let name = element.name();
            if SKIPPED_CONTAINERS.contains(&name) {
                return;
            }
            if name == "img" {
                if let Some(label) = image_label(&element) {
                    out.push_str(label);
                    out.push(' ');
                }
                return;
            }
            if name == "br" {
                out.push(' ');
            }
            for child in node.children() {
                collect_text(child, out);
            }
        }
        // Document and fragment roots; comments and doctypes have no
        // children to visit.
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn image_label(element: &Element) -> Option<&str> {
    if element
        .attr("aria-hidden")
        .map_or(false, |value| value.trim().eq_ignore_ascii_case("true"))
    {
        return None;
    }
    if element.attr("role").map_or(false, |role| {
        let role = role.trim();
        role.eq_ignore_ascii_case("presentation") || role.eq_ignore_ascii_case("none")
    }) {
        return None;
    }
    let label = element
        .attr("alt")
        .or_else(|| element.attr("aria-label"))?
        .trim();
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_non_content_markup() {
        let html = r#"
            <html><head><style>body { color: red; }</style></head>
            <body>
                <nav>Home | Jobs</nav>
                <header>Acme Careers</header>
                <p>Staff Engineer, Platform</p>
                <script>trackPageView();</script>
                <footer>© Acme</footer>
            </body></html>
        "#;
        assert_eq!(html_to_text(html), "Staff Engineer, Platform");
    }

    #[test]
    fn test_renders_image_labels() {
        let html = r#"<p><img src="logo.png" alt="Acme Corp"> is hiring</p>"#;
        assert_eq!(html_to_text(html), "Acme Corp is hiring");

        let html = r#"<p><img src="icon.png" aria-label="Remote friendly"> role</p>"#;
        assert_eq!(html_to_text(html), "Remote friendly role");
    }

    #[test]
    fn test_skips_decorative_images() {
        let html = r#"<p><img src="spacer.gif" alt="ignored" aria-hidden="true">Pay: $180k</p>"#;
        assert_eq!(html_to_text(html), "Pay: $180k");

        let html = r#"<p><img src="border.png" alt="ignored" role="presentation">Benefits</p>"#;
        assert_eq!(html_to_text(html), "Benefits");

        let html = r#"<p><img src="dot.png" role="none" alt="ignored">Apply now</p>"#;
        assert_eq!(html_to_text(html), "Apply now");

        // An empty alt is decorative by convention.
        let html = r#"<p><img src="divider.png" alt="">Team</p>"#;
        assert_eq!(html_to_text(html), "Team");
    }

    #[test]
    fn test_collapses_whitespace() {
        let html = "<p>Senior\n\n   Backend\t\tEngineer</p><p>Berlin</p>";
        assert_eq!(html_to_text(html), "Senior Backend Engineer Berlin");
    }

    #[test]
    fn test_aside_and_noscript_dropped() {
        let html = r#"
            <main>Lead Data Engineer</main>
            <aside>Related jobs</aside>
            <noscript>Enable JavaScript</noscript>
        "#;
        assert_eq!(html_to_text(html), "Lead Data Engineer");
    }

    #[test]
    fn test_plain_fragment() {
        assert_eq!(html_to_text("just text"), "just text");
        assert_eq!(html_to_text(""), "");
    }
}
