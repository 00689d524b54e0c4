/*!
shared.rs - shared runtime pieces for subcommands.

Focus:
  - GeneralOptions: global connection / output flags and their env fallbacks
  - Context: lazily established connection, output streams and selector
  - resolve_definition: mock files > server URL > --name > default connection
  - PromptSelector: numbered choice on any reader/writer pair
  - parse_assignments / coerce_cim_value: `--property NAME=VALUE` handling
  - glob_matcher / in_namespaces: helpers for the multi-namespace commands
*/

use anyhow::{Context as _, Result, anyhow, bail};
use clap::Args;
use globset::{GlobBuilder, GlobMatcher};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::cim::target::{self, TargetSpec};
use crate::cim::{CimValue, ObjectPath, WbemConnection};
use crate::cmd::format::{CimObjects, ConsoleRenderer, OutputFormat, StyleOptions};
use crate::connections::{ConnectionDefinition, ConnectionRepository};
use crate::engine::{OpError, ResultsHandler, resolve_namespaces};
use crate::indication::Selector;

/* ---- Global options ---- */

/// Connection and output flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GeneralOptions {
    /// WBEM server URL: [http|https://]host[:port] (or WBEMCLI_SERVER env)
    #[arg(short = 's', long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Mock repository file(s), .yaml/.yml/.json (repeatable; or WBEMCLI_MOCK_SERVER env)
    #[arg(short = 'm', long = "mock-server", global = true, value_name = "FILE")]
    pub mock_server: Vec<String>,

    /// Use a named connection from the connections file (or WBEMCLI_NAME env)
    #[arg(long, global = true, value_name = "NAME")]
    pub name: Option<String>,

    /// Namespace used when a command gets no -n/--namespace
    #[arg(short = 'd', long = "default-namespace", global = true, value_name = "NS")]
    pub default_namespace: Option<String>,

    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,

    /// Operation timeout in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u32>,

    /// Do not verify the server certificate
    #[arg(long = "no-verify", global = true)]
    pub no_verify: bool,

    #[arg(short = 'o', long = "output-format", global = true, value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Connections file (default: ./wbemcli_connections.yaml; or WBEMCLI_CONNECTIONS_FILE env)
    #[arg(long = "connections-file", global = true, value_name = "PATH")]
    pub connections_file: Option<PathBuf>,
}

impl GeneralOptions {
    /// Fill unset options from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if self.server.is_none() {
            self.server = get("WBEMCLI_SERVER");
        }
        if self.mock_server.is_empty()
            && let Some(files) = get("WBEMCLI_MOCK_SERVER")
        {
            self.mock_server = vec![files];
        }
        if self.name.is_none() {
            self.name = get("WBEMCLI_NAME");
        }
        if self.connections_file.is_none() {
            self.connections_file = get("WBEMCLI_CONNECTIONS_FILE").map(PathBuf::from);
        }
    }

    /// Connection definition described directly by --server / --mock-server.
    pub fn definition_from_flags(&self) -> Result<Option<ConnectionDefinition>> {
        if self.server.is_some() && !self.mock_server.is_empty() {
            bail!("--server and --mock-server are mutually exclusive");
        }
        if self.server.is_none() && self.mock_server.is_empty() {
            return Ok(None);
        }
        Ok(Some(ConnectionDefinition {
            server: self.server.clone(),
            mock_server: self.mock_server.clone(),
            default_namespace: self.default_namespace.clone(),
            user: self.user.clone(),
            timeout: self.timeout,
            no_verify: self.no_verify,
        }))
    }

    pub fn open_repository(&self) -> Result<ConnectionRepository> {
        let path = ConnectionRepository::resolve_path(self.connections_file.as_deref());
        Ok(ConnectionRepository::open(path)?)
    }
}

/* ---- Target resolution ---- */

/// Where the connection definition of a command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    Flags,
    Named(String),
    Default(String),
}

impl fmt::Display for ConnectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionSource::Flags => f.write_str("command line"),
            ConnectionSource::Named(n) => write!(f, "connection '{n}'"),
            ConnectionSource::Default(n) => write!(f, "default connection '{n}'"),
        }
    }
}

/// A target that could not be parsed. `main` exits with status 2 for it.
#[derive(Debug, Error)]
#[error("Invalid target '{target}': {reason}")]
pub struct InvalidTarget {
    pub target: String,
    pub reason: String,
}

/// Pick the connection definition for a command: --mock-server, --server,
/// --name, then the repository's default connection.
pub fn resolve_definition(
    opts: &GeneralOptions,
) -> Result<Option<(ConnectionSource, ConnectionDefinition)>> {
    if let Some(def) = opts.definition_from_flags()? {
        return Ok(Some((ConnectionSource::Flags, def)));
    }
    let repo = opts.open_repository()?;
    let (source, name) = match (&opts.name, repo.default_connection()) {
        (Some(n), _) => (ConnectionSource::Named(n.clone()), n.clone()),
        (None, Some(d)) => (ConnectionSource::Default(d.to_string()), d.to_string()),
        (None, None) => return Ok(None),
    };
    let mut def = repo.get(&name)?.clone();
    if opts.default_namespace.is_some() {
        def.default_namespace = opts.default_namespace.clone();
    }
    Ok(Some((source, def)))
}

/// Parse the target of a definition, reporting failures as `InvalidTarget`.
pub fn target_spec(def: &ConnectionDefinition) -> Result<TargetSpec> {
    let parsed = match &def.server {
        Some(server) => target::parse_server(server),
        None => target::parse_mock(&def.mock_server),
    };
    parsed.map_err(|e| {
        InvalidTarget {
            target: def.target_summary(),
            reason: format!("{e:#}"),
        }
        .into()
    })
}

/* ---- Context ---- */

struct Connected {
    conn: Box<dyn WbemConnection>,
    target: TargetSpec,
}

/// Everything a command handler needs. The connection is established on
/// first use so `connection` commands work without a server.
pub struct Context {
    opts: GeneralOptions,
    connected: Option<Connected>,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    style: StyleOptions,
    selector: Box<dyn Selector>,
}

/// Borrowed view handed to a command once connected.
pub struct Session<'a> {
    pub conn: &'a mut dyn WbemConnection,
    pub target: &'a TargetSpec,
    pub out: ConsoleRenderer<'a>,
    pub selector: &'a mut dyn Selector,
}

impl Context {
    pub fn new(opts: GeneralOptions) -> Self {
        Context {
            opts,
            connected: None,
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
            style: StyleOptions::detect(),
            selector: Box::new(PromptSelector::stdio()),
        }
    }

    /// Context over an already open connection.
    #[cfg(test)]
    pub fn with_connection(
        opts: GeneralOptions,
        conn: Box<dyn WbemConnection>,
        target: TargetSpec,
    ) -> Self {
        let mut ctx = Context::new(opts);
        ctx.connected = Some(Connected { conn, target });
        ctx
    }

    #[cfg(test)]
    pub fn with_output(mut self, out: Box<dyn Write>, err: Box<dyn Write>, style: StyleOptions) -> Self {
        self.out = out;
        self.err = err;
        self.style = style;
        self
    }

    #[cfg(test)]
    pub fn with_selector(mut self, selector: Box<dyn Selector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn options(&self) -> &GeneralOptions {
        &self.opts
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Interactive selection without a connection.
    pub fn select(&mut self, prompt: &str, choices: &[String]) -> Option<usize> {
        self.selector.select(prompt, choices)
    }

    fn connect(&mut self) -> Result<()> {
        if self.connected.is_some() {
            return Ok(());
        }
        let Some((source, def)) = resolve_definition(&self.opts)? else {
            bail!(
                "No WBEM server specified: use --server, --mock-server, --name or \
                 select a default with 'connection select'"
            );
        };
        let spec = target_spec(&def)?;
        tracing::info!(%source, target = %spec, "connecting");
        tracing::debug!(user = ?def.user, timeout = ?def.timeout, no_verify = def.no_verify, "connection options");
        let conn = target::establish(&spec, def.default_namespace.as_deref())?;
        self.connected = Some(Connected { conn, target: spec });
        Ok(())
    }

    /// Output without a connection.
    pub fn renderer(&mut self, default: OutputFormat) -> ConsoleRenderer<'_> {
        let format = self.opts.output_format.unwrap_or(default);
        ConsoleRenderer::new(&mut *self.out, &mut *self.err, format, self.style.clone())
    }

    /// Connect if needed and hand out the connection with the output streams.
    pub fn session(&mut self, default: OutputFormat) -> Result<Session<'_>> {
        self.connect()?;
        let format = self.opts.output_format.unwrap_or(default);
        let connected = self
            .connected
            .as_mut()
            .ok_or_else(|| anyhow!("connection not established"))?;
        Ok(Session {
            conn: connected.conn.as_mut(),
            target: &connected.target,
            out: ConsoleRenderer::new(&mut *self.out, &mut *self.err, format, self.style.clone()),
            selector: &mut *self.selector,
        })
    }
}

/* ---- Interactive selection ---- */

/// Numbered-list selection. Prompts go to `output`, the answer is read from
/// `input`; anything but a listed number cancels.
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptSelector { input, output }
    }
}

impl PromptSelector<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        PromptSelector::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Selector for PromptSelector<R, W> {
    fn select(&mut self, prompt: &str, choices: &[String]) -> Option<usize> {
        let _ = writeln!(self.output, "{prompt}:");
        for (i, choice) in choices.iter().enumerate() {
            let _ = writeln!(self.output, "  [{}] {choice}", i + 1);
        }
        let _ = write!(self.output, "Enter number (1-{}): ", choices.len());
        let _ = self.output.flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => match line.trim().parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => Some(n - 1),
                _ => None,
            },
        }
    }
}

/* ---- Property values ---- */

/// Split repeated `NAME=VALUE` options.
pub fn parse_assignments(items: &[String]) -> Result<Vec<(String, String)>> {
    items
        .iter()
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
            Some(_) => bail!("invalid --property (empty name): {kv}"),
            None => bail!("invalid --property (expected NAME=VALUE): {kv}"),
        })
        .collect()
}

fn int_range(cim_type: &str) -> Option<(i128, i128)> {
    let range = match cim_type {
        "uint8" => (0, u8::MAX as i128),
        "uint16" => (0, u16::MAX as i128),
        "uint32" => (0, u32::MAX as i128),
        "uint64" => (0, i64::MAX as i128),
        "sint8" => (i8::MIN as i128, i8::MAX as i128),
        "sint16" => (i16::MIN as i128, i16::MAX as i128),
        "sint32" => (i32::MIN as i128, i32::MAX as i128),
        "sint64" => (i64::MIN as i128, i64::MAX as i128),
        _ => return None,
    };
    Some(range)
}

fn coerce_scalar(raw: &str, cim_type: &str) -> Result<CimValue> {
    let ty = cim_type.to_ascii_lowercase();
    if let Some((min, max)) = int_range(&ty) {
        let n: i128 = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {cim_type} value '{raw}'"))?;
        if n < min || n > max {
            bail!("{cim_type} value {n} out of range");
        }
        return Ok(CimValue::Integer(n as i64));
    }
    match ty.as_str() {
        "boolean" => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(CimValue::Boolean(true)),
            "false" | "0" | "no" | "n" => Ok(CimValue::Boolean(false)),
            _ => bail!("invalid boolean value '{raw}'"),
        },
        "real32" | "real64" => raw
            .trim()
            .parse::<f64>()
            .map(CimValue::Real)
            .with_context(|| format!("invalid {cim_type} value '{raw}'")),
        "reference" => ObjectPath::from_str(raw.trim())
            .map(CimValue::reference)
            .with_context(|| format!("invalid reference value '{raw}'")),
        _ => Ok(CimValue::string(raw)),
    }
}

/// Convert a command line string to a value of the property's CIM type.
/// Array values are comma separated.
pub fn coerce_cim_value(raw: &str, cim_type: &str, is_array: bool) -> Result<CimValue> {
    if !is_array {
        return coerce_scalar(raw, cim_type);
    }
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| coerce_scalar(item, cim_type))
        .collect::<Result<Vec<_>>>()
        .map(CimValue::Array)
}

/* ---- Multi-namespace helpers ---- */

/// Case-insensitive shell glob for class names.
pub fn glob_matcher(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
        .with_context(|| format!("invalid class name pattern '{pattern}'"))?;
    Ok(glob.compile_matcher())
}

/// Namespaces a command runs against.
pub fn target_namespaces(
    conn: &dyn WbemConnection,
    requested: &[String],
    default_all: bool,
) -> Result<Vec<String>> {
    let resolved = resolve_namespaces(conn, requested, default_all)
        .context("Failed to determine target namespaces")?;
    if let Some(warning) = &resolved.warning {
        tracing::warn!("{warning}");
    }
    Ok(resolved.names)
}

/// Run `op` in every namespace through a `ResultsHandler` rendering to `out`.
pub fn in_namespaces<F>(
    out: &mut ConsoleRenderer<'_>,
    namespaces: Vec<String>,
    object_type: &str,
    target: &str,
    op: F,
) -> Result<()>
where
    F: FnMut(&str) -> Result<CimObjects, OpError>,
{
    ResultsHandler::new(namespaces, object_type, target, out).run(op)?;
    Ok(())
}

/* ---- Test support ---- */

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::cim::mock::fixture;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Cloneable in-memory writer.
    #[derive(Clone, Default)]
    pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Always picks the same index (or cancels with `None`).
    pub struct FixedSelector(pub Option<usize>);

    impl Selector for FixedSelector {
        fn select(&mut self, _prompt: &str, _choices: &[String]) -> Option<usize> {
            self.0
        }
    }

    /// Context over the fixture repository with captured output.
    pub fn mock_context(format: OutputFormat) -> (Context, SharedBuf, SharedBuf) {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let opts = GeneralOptions {
            output_format: Some(format),
            ..GeneralOptions::default()
        };
        let ctx = Context::with_connection(
            opts,
            Box::new(fixture()),
            TargetSpec::Mock {
                files: vec![PathBuf::from("mock/simple_repo.yaml")],
            },
        )
        .with_output(Box::new(out.clone()), Box::new(err.clone()), StyleOptions::plain())
        .with_selector(Box::new(FixedSelector(None)));
        (ctx, out, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_fills_only_unset_options() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WBEMCLI_SERVER", "https://env:5989"),
            ("WBEMCLI_MOCK_SERVER", "a.yaml,b.yaml"),
            ("WBEMCLI_NAME", " "),
        ]);
        let mut opts = GeneralOptions {
            server: Some("https://flag".into()),
            ..GeneralOptions::default()
        };
        opts.apply_env_with(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(opts.server.as_deref(), Some("https://flag"));
        assert_eq!(opts.mock_server, vec!["a.yaml,b.yaml"]);
        assert!(opts.name.is_none(), "blank env values are ignored");
    }

    #[test]
    fn flags_win_over_connections_file() {
        let opts = GeneralOptions {
            mock_server: vec!["repo.yaml".into()],
            name: Some("dev".into()),
            ..GeneralOptions::default()
        };
        let (source, def) = resolve_definition(&opts).unwrap().unwrap();
        assert_eq!(source, ConnectionSource::Flags);
        assert_eq!(def.mock_server, vec!["repo.yaml"]);
    }

    #[test]
    fn server_and_mock_conflict() {
        let opts = GeneralOptions {
            server: Some("https://x".into()),
            mock_server: vec!["repo.yaml".into()],
            ..GeneralOptions::default()
        };
        assert!(opts.definition_from_flags().is_err());
    }

    #[test]
    fn named_and_default_connections_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.yaml");
        let mut repo = ConnectionRepository::open(&path).unwrap();
        let def = |f: &str| ConnectionDefinition {
            mock_server: vec![f.into()],
            ..ConnectionDefinition::default()
        };
        repo.add("a", def("a.yaml")).unwrap();
        repo.add("b", def("b.yaml")).unwrap();
        repo.set_default(Some("b")).unwrap();
        repo.save().unwrap();

        let mut opts = GeneralOptions {
            connections_file: Some(path),
            ..GeneralOptions::default()
        };
        let (source, d) = resolve_definition(&opts).unwrap().unwrap();
        assert_eq!(source, ConnectionSource::Default("b".into()));
        assert_eq!(d.mock_server, vec!["b.yaml"]);

        opts.name = Some("a".into());
        opts.default_namespace = Some("root/x".into());
        let (source, d) = resolve_definition(&opts).unwrap().unwrap();
        assert_eq!(source, ConnectionSource::Named("a".into()));
        assert_eq!(d.default_namespace.as_deref(), Some("root/x"));

        opts.name = Some("missing".into());
        assert!(resolve_definition(&opts).is_err());
    }

    #[test]
    fn nothing_configured_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let opts = GeneralOptions {
            connections_file: Some(dir.path().join("none.yaml")),
            ..GeneralOptions::default()
        };
        assert!(resolve_definition(&opts).unwrap().is_none());
    }

    #[test]
    fn invalid_target_is_typed() {
        let def = ConnectionDefinition {
            server: Some("ftp://x".into()),
            ..ConnectionDefinition::default()
        };
        let err = target_spec(&def).unwrap_err();
        assert!(err.downcast_ref::<InvalidTarget>().is_some());
    }

    #[test]
    fn prompt_selector_reads_a_number() {
        let choices = vec!["a".to_string(), "b".to_string()];
        let mut shown = Vec::new();
        let mut sel = PromptSelector::new("2\n".as_bytes(), &mut shown);
        assert_eq!(sel.select("Pick", &choices), Some(1));
        let shown = String::from_utf8(shown).unwrap();
        assert!(shown.contains("[1] a") && shown.contains("[2] b"));

        let mut sink = Vec::new();
        assert_eq!(PromptSelector::new("9\n".as_bytes(), &mut sink).select("Pick", &choices), None);
        assert_eq!(PromptSelector::new("".as_bytes(), &mut sink).select("Pick", &choices), None);
    }

    #[test]
    fn assignments_split_on_first_equals() {
        let got = parse_assignments(&["Name=a=b".into(), "X=".into()]).unwrap();
        assert_eq!(got, vec![("Name".into(), "a=b".into()), ("X".into(), String::new())]);
        assert!(parse_assignments(&["=v".into()]).is_err());
        assert!(parse_assignments(&["novalue".into()]).is_err());
    }

    #[test]
    fn coercion_follows_cim_type() {
        assert_eq!(coerce_cim_value("42", "uint32", false).unwrap(), CimValue::Integer(42));
        assert!(coerce_cim_value("-1", "uint8", false).is_err());
        assert!(coerce_cim_value("300", "uint8", false).is_err());
        assert_eq!(coerce_cim_value("No", "boolean", false).unwrap(), CimValue::Boolean(false));
        assert!(coerce_cim_value("maybe", "boolean", false).is_err());
        assert_eq!(coerce_cim_value("1.5", "real64", false).unwrap(), CimValue::Real(1.5));
        assert_eq!(
            coerce_cim_value("a, b", "string", true).unwrap(),
            CimValue::Array(vec![CimValue::string("a"), CimValue::string("b")])
        );
        let r = coerce_cim_value("TST_Person.name=\"Mike\"", "reference", false).unwrap();
        assert_eq!(r.as_path().unwrap().classname, "TST_Person");
    }

    #[test]
    fn glob_is_case_insensitive() {
        let m = glob_matcher("cim_foo*").unwrap();
        assert!(m.is_match("CIM_Foo_sub"));
        assert!(!m.is_match("TST_Person"));
    }

    /// Thread-safe log sink for a scoped subscriber.
    #[derive(Clone, Default)]
    struct LogBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for LogBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Warnings logged while `f` runs, at the default level.
    fn logged_warnings(f: impl FnOnce()) -> String {
        let buf = LogBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn interop_fallback_is_logged_once() {
        let repo: crate::cim::mock::MockRepository =
            serde_yaml::from_str("namespaces: {root/cimv2: {}, root/other: {}}").unwrap();
        let conn =
            crate::cim::mock::MockWbemServer::from_repository(repo, None, "mock:t").unwrap();
        let mut names = Vec::new();
        let logs = logged_warnings(|| names = target_namespaces(&conn, &[], true).unwrap());
        assert_eq!(names, vec!["root/cimv2"]);
        assert_eq!(logs.matches("Interop namespace not found").count(), 1);
    }

    #[test]
    fn namespace_failures_are_reported_not_logged() {
        let conn = crate::cim::mock::fixture();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let logs = logged_warnings(|| {
            let mut r =
                ConsoleRenderer::new(&mut out, &mut err, OutputFormat::Text, StyleOptions::plain());
            in_namespaces(
                &mut r,
                vec!["root/cimv2".into(), "root/nothere".into()],
                "qualifier",
                "Key",
                |ns| Ok(CimObjects::Qualifiers(vec![conn.get_qualifier(ns, "Key")?])),
            )
            .unwrap();
        });
        assert!(logs.is_empty(), "unexpected log output: {logs}");
        let err = String::from_utf8(err).unwrap();
        assert_eq!(err.matches("failed in 1 namespace(s)").count(), 1);
        assert!(err.contains("root/nothere"));
        assert!(!out.is_empty());
    }
}
