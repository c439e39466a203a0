//! The portfolio page served at `/`.
//!
//! The page itself carries no photos. It renders the text from
//! `[portfolio]` and loads `/photos` client-side (`static/gallery.js`), so
//! the HTML never holds a signed URL that could expire in a browser cache.

use crate::config::PortfolioConfig;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};

pub const CSS: &str = include_str!("../static/style.css");
pub const JS: &str = include_str!("../static/gallery.js");

/// Embedded static asset by file name, with its content type.
pub fn static_asset(name: &str) -> Option<(&'static str, &'static str)> {
    match name {
        "style.css" => Some(("text/css; charset=utf-8", CSS)),
        "gallery.js" => Some(("text/javascript; charset=utf-8", JS)),
        _ => None,
    }
}

fn markdown_to_html(markdown: &str) -> String {
    let mut out = String::new();
    md_html::push_html(&mut out, Parser::new(markdown));
    out
}

fn base_document(title: &str, description: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta name="description" content=(description);
                title { (title) }
                link rel="stylesheet" href="/static/style.css";
            }
            body {
                (content)
                script src="/static/gallery.js" defer {}
            }
        }
    }
}

/// Render the index page.
pub fn render_index(portfolio: &PortfolioConfig) -> Markup {
    let about_html = markdown_to_html(&portfolio.about_content);
    let content = html! {
        header.site-header {
            h1 { (portfolio.title) }
            nav.site-nav {
                a href="#gallery" { "Gallery" }
                a href="#about" { (portfolio.about_heading) }
                a href="#contact" { (portfolio.contact_heading) }
            }
        }
        main {
            section id="gallery" class="gallery-grid" aria-live="polite" {
                p.gallery-status { "Loading photos…" }
            }
            section.about id="about" {
                h2 { (portfolio.about_heading) }
                div.about-content { (PreEscaped(about_html)) }
            }
            section.contact id="contact" {
                h2 { (portfolio.contact_heading) }
                a href={ "mailto:" (portfolio.contact_email) } { (portfolio.contact_email) }
            }
        }
        div.lightbox id="lightbox" hidden {
            button.lightbox-close type="button" aria-label="Close" { "×" }
            img.lightbox-image alt="";
        }
        footer.site-footer {
            p { (portfolio.footer_text) }
        }
    };
    base_document(&portfolio.title, &portfolio.meta_description, content)
}
