/*!
format.rs

Console output for `wbemcli` commands.

  - OutputFormat: mof | table | text | json | yaml (`-o/--output-format`)
  - CimObjects: payload of one namespace in a multi-namespace session
  - ConsoleRenderer: `ResultRenderer<CimObjects>` writing results to `out`
    and the per-namespace error report to `err`
  - color / box_header / table: styling primitives (NO_COLOR disables ANSI)

Machine formats (json/yaml) never go through the styling helpers.
*/

use clap::ValueEnum;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::io::{self, IsTerminal, Write};

use crate::cim::mof::{class_to_mof, instance_to_mof, qualifier_decl_to_mof};
use crate::cim::{CimClass, CimInstance, ObjectPath, QualifierDecl, WbemError};
use crate::engine::ResultRenderer;

/* -------------------------------------------------------------------------- */
/* Formats                                                                    */
/* -------------------------------------------------------------------------- */

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    /// MOF text for CIM objects
    Mof,
    /// Aligned table
    Table,
    /// Plain one-item-per-line text
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn is_machine(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Mof => "mof",
            OutputFormat::Table => "table",
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub classname: String,
    pub count: usize,
}

/// What one namespace produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CimObjects {
    Classes(Vec<CimClass>),
    ClassNames(Vec<String>),
    Instances(Vec<CimInstance>),
    Paths(Vec<ObjectPath>),
    Qualifiers(Vec<QualifierDecl>),
    Counts(Vec<ClassCount>),
    /// Number of objects only (`--summary`).
    Summary(usize),
}

impl CimObjects {
    pub fn len(&self) -> usize {
        match self {
            CimObjects::Classes(v) => v.len(),
            CimObjects::ClassNames(v) => v.len(),
            CimObjects::Instances(v) => v.len(),
            CimObjects::Paths(v) => v.len(),
            CimObjects::Qualifiers(v) => v.len(),
            CimObjects::Counts(v) => v.len(),
            CimObjects::Summary(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collapse into a `Summary` when only a count was asked for.
    pub fn summarized(self, summary: bool) -> Self {
        if summary {
            CimObjects::Summary(self.len())
        } else {
            self
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Styling                                                                    */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub term_width: usize,
}

impl StyleOptions {
    pub fn detect() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(120);
        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal(),
            term_width: width,
        }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            term_width: 120,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Accent,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",
        Role::Secondary => "38;5;250",
        Role::Accent => "38;5;213",
        Role::Success => "38;5;82",
        Role::Warning => "38;5;214",
        Role::Error => "38;5;196",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

/// Single-line boxed title with an optional dimmed subtitle.
pub fn box_header(title: &str, subtitle: Option<&str>, style: &StyleOptions) -> String {
    let inner = match subtitle {
        Some(sub) => format!(
            "{}  {}",
            color(Role::Primary, title, style),
            color(Role::Secondary, sub, style)
        ),
        None => color(Role::Primary, title, style),
    };
    let max_inner = style.term_width.saturating_sub(4).max(10);
    let inner = if display_width(&inner) > max_inner {
        truncate_ellipsis(&strip_ansi(&inner), max_inner)
    } else {
        inner
    };
    let width = display_width(&inner) + 2;
    let rule = "─".repeat(width);
    format!("┌{rule}┐\n│ {inner} │\n└{rule}┘")
}

/// Render rows under headers with two-space gutters. Cells wider than the
/// share of the terminal their column gets are truncated.
pub fn table(headers: &[&str], rows: &[Vec<String>], style: &StyleOptions) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let total: usize = widths.iter().sum::<usize>() + (cols - 1) * 2;
    if total > style.term_width {
        let mut overflow = total - style.term_width;
        let mut order: Vec<usize> = (0..cols).collect();
        order.sort_by(|a, b| widths[*b].cmp(&widths[*a]));
        for idx in order {
            if overflow == 0 {
                break;
            }
            let shrink = widths[idx].saturating_sub(8).min(overflow);
            widths[idx] -= shrink;
            overflow -= shrink;
        }
    }

    let mut out = Vec::with_capacity(rows.len() + 2);
    let header = table_line(headers.iter().copied(), &widths);
    out.push(color(Role::Accent, header, style));
    let sep = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("  ");
    out.push(color(Role::Dim, sep, style));
    for row in rows {
        let cells = (0..cols).map(|i| row.get(i).map(String::as_str).unwrap_or(""));
        out.push(table_line(cells, &widths));
    }
    out.join("\n")
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(c, w)| pad_or_truncate(c, *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn pad_or_truncate(s: &str, width: usize) -> String {
    let len = display_width(s);
    if len <= width {
        return format!("{s}{}", " ".repeat(width - len));
    }
    truncate_ellipsis(&strip_ansi(s), width)
}

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 1 {
        return "…".into();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut buf = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for n in chars.by_ref() {
                if n.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        buf.push(c);
    }
    Cow::Owned(buf)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/* -------------------------------------------------------------------------- */
/* Console renderer                                                           */
/* -------------------------------------------------------------------------- */

fn serialize_error(e: impl fmt::Display) -> io::Error {
    io::Error::other(format!("failed to serialize output: {e}"))
}

/// Writes command output to `out`; error reports go to `err`.
pub struct ConsoleRenderer<'a> {
    out: &'a mut dyn Write,
    err: &'a mut dyn Write,
    format: OutputFormat,
    style: StyleOptions,
}

impl<'a> ConsoleRenderer<'a> {
    pub fn new(
        out: &'a mut dyn Write,
        err: &'a mut dyn Write,
        format: OutputFormat,
        style: StyleOptions,
    ) -> Self {
        ConsoleRenderer {
            out,
            err,
            format,
            style,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.out, "{}", text.as_ref())
    }

    pub fn title(&mut self, title: &str, subtitle: Option<&str>) -> io::Result<()> {
        let header = box_header(title, subtitle, &self.style);
        writeln!(self.out, "{header}")
    }

    pub fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
        let rendered = table(headers, rows, &self.style);
        writeln!(self.out, "{rendered}")
    }

    /// JSON or YAML rendering of any serializable value. Other formats fall back to YAML.
    pub fn value<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        let text = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value).map_err(serialize_error)?,
            _ => serde_yaml::to_string(value).map_err(serialize_error)?,
        };
        writeln!(self.out, "{}", text.trim_end())
    }

    pub fn warning(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        let label = color(Role::Warning, "Warning:", &self.style);
        writeln!(self.err, "{label} {}", text.as_ref())
    }

    pub fn error(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        let label = color(Role::Error, "Error:", &self.style);
        writeln!(self.err, "{label} {}", text.as_ref())
    }

    pub fn success(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        if self.format.is_machine() {
            return Ok(());
        }
        writeln!(self.out, "{}", color(Role::Success, text, &self.style))
    }

    fn objects(&mut self, object_type: &str, objects: &CimObjects) -> io::Result<()> {
        match (self.format, objects) {
            (_, CimObjects::Summary(n)) => {
                writeln!(self.out, "{n} {object_type}(s) returned")
            }
            (OutputFormat::Mof, CimObjects::Classes(classes)) => {
                let blocks: Vec<String> = classes.iter().map(class_to_mof).collect();
                writeln!(self.out, "{}", blocks.join("\n"))
            }
            (OutputFormat::Mof, CimObjects::Instances(instances)) => {
                let blocks: Vec<String> = instances.iter().map(instance_to_mof).collect();
                writeln!(self.out, "{}", blocks.join("\n"))
            }
            (OutputFormat::Mof, CimObjects::Qualifiers(decls)) => {
                for decl in decls {
                    writeln!(self.out, "{}", qualifier_decl_to_mof(decl))?;
                }
                Ok(())
            }
            (OutputFormat::Table, objects) => {
                let (headers, rows) = table_rows(objects);
                let headers: Vec<&str> = headers.iter().map(String::as_str).collect();
                self.table(&headers, &rows)
            }
            (_, CimObjects::Counts(counts)) => {
                for c in counts {
                    writeln!(self.out, "{}: {}", c.classname, c.count)?;
                }
                Ok(())
            }
            (_, objects) => {
                for item in text_lines(objects) {
                    writeln!(self.out, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// One line per object: names, paths, or identifying names of full objects.
fn text_lines(objects: &CimObjects) -> Vec<String> {
    match objects {
        CimObjects::Classes(v) => v.iter().map(|c| c.classname.clone()).collect(),
        CimObjects::ClassNames(v) => v.clone(),
        CimObjects::Instances(v) => v
            .iter()
            .map(|i| {
                i.path
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| i.classname.clone())
            })
            .collect(),
        CimObjects::Paths(v) => v.iter().map(ToString::to_string).collect(),
        CimObjects::Qualifiers(v) => v.iter().map(|q| q.name.clone()).collect(),
        CimObjects::Counts(v) => v
            .iter()
            .map(|c| format!("{}: {}", c.classname, c.count))
            .collect(),
        CimObjects::Summary(n) => vec![n.to_string()],
    }
}

fn table_rows(objects: &CimObjects) -> (Vec<String>, Vec<Vec<String>>) {
    let h = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    match objects {
        CimObjects::Classes(classes) => (
            h(&["Classname", "Superclass", "Qualifiers"]),
            classes
                .iter()
                .map(|c| {
                    vec![
                        c.classname.clone(),
                        c.superclass.clone().unwrap_or_default(),
                        c.qualifiers.keys().cloned().collect::<Vec<_>>().join(", "),
                    ]
                })
                .collect(),
        ),
        CimObjects::Instances(instances) => {
            // Columns: union of property names, in first-seen order.
            let mut columns: Vec<String> = Vec::new();
            for inst in instances {
                for name in inst.properties.keys() {
                    if !columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                        columns.push(name.clone());
                    }
                }
            }
            let rows = instances
                .iter()
                .map(|inst| {
                    columns
                        .iter()
                        .map(|col| inst.get(col).map(ToString::to_string).unwrap_or_default())
                        .collect()
                })
                .collect();
            (columns, rows)
        }
        CimObjects::Qualifiers(decls) => (
            h(&["Name", "Type", "Value", "Array", "Scopes", "Flavors"]),
            decls
                .iter()
                .map(|q| {
                    let scopes: Vec<String> = q.scopes.iter().map(|s| s.to_string()).collect();
                    let mut flavors = Vec::new();
                    if let Some(o) = q.overridable {
                        flavors.push(if o { "EnableOverride" } else { "DisableOverride" });
                    }
                    if let Some(t) = q.tosubclass {
                        flavors.push(if t { "ToSubclass" } else { "Restricted" });
                    }
                    if q.translatable == Some(true) {
                        flavors.push("Translatable");
                    }
                    vec![
                        q.name.clone(),
                        q.cim_type.clone(),
                        q.value.as_ref().map(ToString::to_string).unwrap_or_default(),
                        q.is_array.to_string(),
                        scopes.join(", "),
                        flavors.join(", "),
                    ]
                })
                .collect(),
        ),
        CimObjects::Counts(counts) => (
            h(&["Class", "Count"]),
            counts
                .iter()
                .map(|c| vec![c.classname.clone(), c.count.to_string()])
                .collect(),
        ),
        CimObjects::ClassNames(_) => (
            h(&["Classname"]),
            text_lines(objects).into_iter().map(|l| vec![l]).collect(),
        ),
        CimObjects::Paths(_) => (
            h(&["Path"]),
            text_lines(objects).into_iter().map(|l| vec![l]).collect(),
        ),
        CimObjects::Summary(n) => (h(&["Count"]), vec![vec![n.to_string()]]),
    }
}

/// One namespace section of multi-namespace JSON/YAML output.
#[derive(Serialize)]
struct NamespaceResult<'a> {
    namespace: &'a str,
    objects: &'a CimObjects,
}

impl ResultRenderer<CimObjects> for ConsoleRenderer<'_> {
    fn render_results(
        &mut self,
        object_type: &str,
        results: &[(&str, Option<&CimObjects>)],
    ) -> io::Result<()> {
        let successes: Vec<(&str, &CimObjects)> = results
            .iter()
            .filter_map(|(ns, objects)| objects.map(|o| (*ns, o)))
            .collect();
        let multi = results.len() > 1;

        if self.format.is_machine() {
            if multi {
                let sections: Vec<NamespaceResult<'_>> = successes
                    .into_iter()
                    .map(|(namespace, objects)| NamespaceResult { namespace, objects })
                    .collect();
                return self.value(&sections);
            }
            return match successes.first() {
                Some((_, objects)) => self.value(*objects),
                None => Ok(()),
            };
        }

        for (ns, objects) in successes {
            if multi {
                let header = color(Role::Primary, format!("Namespace: {ns}"), &self.style);
                writeln!(self.out, "{header}")?;
            }
            self.objects(object_type, objects)?;
            if multi {
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    fn report_errors(
        &mut self,
        object_type: &str,
        target: &str,
        failures: &[(&str, &WbemError)],
    ) -> io::Result<()> {
        let title = color(
            Role::Error,
            format!("{object_type} '{target}' failed in {} namespace(s):", failures.len()),
            &self.style,
        );
        let rows: Vec<Vec<String>> = failures
            .iter()
            .map(|(ns, e)| vec![ns.to_string(), e.to_string()])
            .collect();
        let rendered = table(&["Namespace", "Error"], &rows, &self.style);
        writeln!(self.err, "{title}\n{rendered}")
    }
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cim::{StatusCode, WbemError};

    fn render(
        format: OutputFormat,
        results: &[(&str, Option<&CimObjects>)],
    ) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        {
            let mut r = ConsoleRenderer::new(&mut out, &mut err, format, StyleOptions::plain());
            r.render_results("class", results).unwrap();
        }
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn multi_namespace_text_gets_sections_in_order() {
        let a = CimObjects::ClassNames(vec!["CIM_A".into()]);
        let b = CimObjects::ClassNames(vec!["CIM_B".into()]);
        let (out, _) = render(
            OutputFormat::Text,
            &[("root/b", Some(&b)), ("root/x", None), ("root/a", Some(&a))],
        );
        let pos_b = out.find("Namespace: root/b").unwrap();
        let pos_a = out.find("Namespace: root/a").unwrap();
        assert!(pos_b < pos_a);
        assert!(!out.contains("root/x"));
        assert!(out.contains("CIM_A") && out.contains("CIM_B"));
    }

    #[test]
    fn single_namespace_has_no_section_header() {
        let names = CimObjects::ClassNames(vec!["CIM_Foo".into()]);
        let (out, _) = render(OutputFormat::Text, &[("root/cimv2", Some(&names))]);
        assert_eq!(out, "CIM_Foo\n");
    }

    #[test]
    fn json_sections_follow_namespace_order() {
        let z = CimObjects::ClassNames(vec!["Z_Class".into()]);
        let a = CimObjects::ClassNames(vec!["A_Class".into()]);
        let dup = CimObjects::ClassNames(vec!["Dup2".into()]);
        let (out, _) = render(
            OutputFormat::Json,
            &[
                ("root/z", Some(&z)),
                ("root/a", Some(&a)),
                ("root/b", None),
                ("root/a", Some(&dup)),
            ],
        );
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        let sections = v.as_array().unwrap();
        let order: Vec<&str> = sections
            .iter()
            .map(|s| s["namespace"].as_str().unwrap())
            .collect();
        assert_eq!(order, vec!["root/z", "root/a", "root/a"]);
        assert_eq!(sections[1]["objects"][0], "A_Class");
        assert_eq!(sections[2]["objects"][0], "Dup2");
    }

    #[test]
    fn yaml_keeps_duplicate_namespaces() {
        let a = CimObjects::ClassNames(vec!["A_Class".into()]);
        let b = CimObjects::ClassNames(vec!["B_Class".into()]);
        let (out, _) = render(OutputFormat::Yaml, &[("root/a", Some(&a)), ("root/a", Some(&b))]);
        assert_eq!(out.matches("namespace: root/a").count(), 2);
        assert!(out.find("A_Class").unwrap() < out.find("B_Class").unwrap());
    }

    #[test]
    fn summary_counts_objects() {
        let s = CimObjects::Paths(vec![ObjectPath::new("CIM_Foo")]).summarized(true);
        let (out, _) = render(OutputFormat::Mof, &[("root/cimv2", Some(&s))]);
        assert_eq!(out, "1 class(s) returned\n");
    }

    #[test]
    fn error_report_goes_to_err_stream() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let e = WbemError::cim(StatusCode::InvalidNamespace, "no such namespace");
        {
            let mut r =
                ConsoleRenderer::new(&mut out, &mut err, OutputFormat::Mof, StyleOptions::plain());
            r.report_errors("class", "CIM_Foo", &[("root/bad", &e)])
                .unwrap();
        }
        assert!(out.is_empty());
        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("class 'CIM_Foo' failed in 1 namespace(s)"));
        assert!(err.contains("root/bad"));
    }

    #[test]
    fn table_truncates_to_terminal_width() {
        let style = StyleOptions {
            use_color: false,
            term_width: 40,
        };
        let rows = vec![vec!["x".repeat(80), "short".into()]];
        let t = table(&["A", "B"], &rows, &style);
        assert!(t.lines().all(|l| l.chars().count() <= 40));
        assert!(t.contains('…'));
    }

    #[test]
    fn strip_ansi_removes_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[31mRED\x1b[0m"), "RED");
    }

    #[test]
    fn box_header_contains_title() {
        let b = box_header("Destinations (2)", Some("interop"), &StyleOptions::plain());
        assert!(b.contains("Destinations (2)  interop"));
        assert_eq!(b.lines().count(), 3);
    }
}
