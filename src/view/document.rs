// src/view/document.rs

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::fmt::Write;

pub const LOADING_ID: &str = "loading";
pub const TRIGGER_ID: &str = "load-button";
pub const DELAY_NOTE_ID: &str = "delay-note";
pub const TABLE_ID: &str = "edu-table";
pub const LAST_REQUEST_ID: &str = "last-request";
pub const CONTAINER_ID: &str = "table-container";

static CONTAINER: Lazy<Selector> = Lazy::new(|| sel(&format!("#{}", CONTAINER_ID)));
static TITLE: Lazy<Selector> = Lazy::new(|| sel("head > title"));
static CAPTION: Lazy<Selector> = Lazy::new(|| sel(&format!("#{} caption", TABLE_ID)));
static THEAD: Lazy<Selector> = Lazy::new(|| sel(&format!("#{} thead", TABLE_ID)));
static TBODY: Lazy<Selector> = Lazy::new(|| sel(&format!("#{} tbody", TABLE_ID)));
static ROW: Lazy<Selector> = Lazy::new(|| sel("tr"));
static CELL: Lazy<Selector> = Lazy::new(|| sel("th, td"));

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("CSS selector for host document should be valid")
}

/// A single element of the host document the views know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub hidden: bool,
    pub text: String,
    pub classes: Vec<String>,
}

impl Element {
    fn from_ref(el: ElementRef<'_>) -> Self {
        Self {
            tag: el.value().name().to_string(),
            hidden: el.value().attr("hidden").is_some(),
            text: collect_text(el),
            classes: el.value().classes().map(str::to_string).collect(),
        }
    }

    pub fn show(&mut self) {
        self.hidden = false;
    }

    pub fn hide(&mut self) {
        self.hidden = true;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    fn write_leaf(&self, out: &mut String, id: &str) {
        write_open_tag(out, &self.tag, id, &self.classes, self.hidden);
        out.push_str(&escape(&self.text));
        let _ = writeln!(out, "</{}>", self.tag);
    }
}

/// The element wrapping the managed region. Only its tag and classes are
/// tracked; its content is the other elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub tag: String,
    pub classes: Vec<String>,
}

impl Container {
    fn from_ref(el: ElementRef<'_>) -> Self {
        Self {
            tag: el.value().name().to_string(),
            classes: el.value().classes().map(str::to_string).collect(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Add `class` if absent, remove it if present. Returns whether it is now set.
    pub fn toggle_class(&mut self, class: &str) -> bool {
        if let Some(pos) = self.classes.iter().position(|c| c == class) {
            self.classes.remove(pos);
            false
        } else {
            self.classes.push(class.to_string());
            true
        }
    }
}

fn write_open_tag(out: &mut String, tag: &str, id: &str, classes: &[String], hidden: bool) {
    let _ = write!(out, "<{} id=\"{}\"", tag, id);
    if !classes.is_empty() {
        let _ = write!(out, " class=\"{}\"", escape(&classes.join(" ")));
    }
    if hidden {
        out.push_str(" hidden");
    }
    out.push('>');
}

/// The table element: caption, header rows and body rows as cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableElement {
    pub caption: String,
    pub head: Vec<Vec<String>>,
    pub body: Vec<Vec<String>>,
}

/// In-process model of the page the document view mutates.
///
/// Built from an HTML template that must already contain every element the
/// view touches; the view never creates elements, it only changes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDocument {
    pub page_title: String,
    pub container: Container,
    pub loading: Element,
    pub trigger: Element,
    pub delay_note: Element,
    pub table: TableElement,
    pub last_request: Element,
}

impl HostDocument {
    /// Locate the required elements in `html`. Every missing one is named in the error.
    pub fn parse(html: &str) -> Result<Self> {
        let doc = Html::parse_document(html);
        let mut missing = Vec::new();

        let mut by_id = |id: &str| -> Option<Element> {
            let found = doc.select(&sel(&format!("#{}", id))).next().map(Element::from_ref);
            if found.is_none() {
                missing.push(format!("#{}", id));
            }
            found
        };
        let loading = by_id(LOADING_ID);
        let trigger = by_id(TRIGGER_ID);
        let delay_note = by_id(DELAY_NOTE_ID);
        let table_el = by_id(TABLE_ID);
        let last_request = by_id(LAST_REQUEST_ID);

        let container = doc.select(&CONTAINER).next().map(Container::from_ref);
        if container.is_none() {
            missing.insert(0, format!("#{}", CONTAINER_ID));
        }

        let caption = doc.select(&CAPTION).next();
        let thead = doc.select(&THEAD).next();
        let tbody = doc.select(&TBODY).next();
        if table_el.is_some() {
            for (part, found) in [
                ("caption", caption.is_some()),
                ("thead", thead.is_some()),
                ("tbody", tbody.is_some()),
            ] {
                if !found {
                    missing.push(format!("#{} {}", TABLE_ID, part));
                }
            }
        }

        if !missing.is_empty() {
            bail!("host document is missing {}", missing.join(", "));
        }

        let (
            Some(container),
            Some(loading),
            Some(trigger),
            Some(delay_note),
            Some(last_request),
            Some(caption),
            Some(thead),
            Some(tbody),
        ) = (
            container,
            loading,
            trigger,
            delay_note,
            last_request,
            caption,
            thead,
            tbody,
        )
        else {
            bail!("host document is incomplete");
        };

        Ok(Self {
            page_title: doc
                .select(&TITLE)
                .next()
                .map(collect_text)
                .unwrap_or_default(),
            container,
            loading,
            trigger,
            delay_note,
            table: TableElement {
                caption: collect_text(caption),
                head: rows_of(thead),
                body: rows_of(tbody),
            },
            last_request,
        })
    }

    /// Serialize the current state as a standalone page.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(out, "<title>{}</title>", escape(&self.page_title));
        out.push_str("</head>\n<body>\n");

        write_open_tag(
            &mut out,
            &self.container.tag,
            CONTAINER_ID,
            &self.container.classes,
            false,
        );
        out.push('\n');
        self.loading.write_leaf(&mut out, LOADING_ID);
        self.trigger.write_leaf(&mut out, TRIGGER_ID);
        self.delay_note.write_leaf(&mut out, DELAY_NOTE_ID);

        let _ = writeln!(out, "<table id=\"{}\">", TABLE_ID);
        let _ = writeln!(out, "<caption>{}</caption>", escape(&self.table.caption));
        out.push_str("<thead>\n");
        write_rows(&mut out, &self.table.head, "th");
        out.push_str("</thead>\n<tbody>\n");
        write_rows(&mut out, &self.table.body, "td");
        out.push_str("</tbody>\n</table>\n");

        self.last_request.write_leaf(&mut out, LAST_REQUEST_ID);
        let _ = writeln!(out, "</{}>", self.container.tag);
        out.push_str("</body>\n</html>\n");
        out
    }
}

fn collect_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn rows_of(section: ElementRef<'_>) -> Vec<Vec<String>> {
    section
        .select(&ROW)
        .map(|tr| tr.select(&CELL).map(collect_text).collect())
        .collect()
}

fn write_rows(out: &mut String, rows: &[Vec<String>], cell: &str) {
    for row in rows {
        out.push_str("<tr>");
        for value in row {
            let _ = write!(out, "<{cell}>{}</{cell}>", escape(value));
        }
        out.push_str("</tr>\n");
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub(crate) const TEMPLATE: &str = include_str!("../../static/index.html");
