//! Minimal MOF rendering for classes, instances and qualifier declarations.
//! No line folding; one element per line.

use super::model::{CimClass, CimInstance, CimValue, QualifierDecl, QualifierSet};

const INDENT: &str = "   ";

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}

pub fn value_to_mof(value: &CimValue) -> String {
    match value {
        CimValue::String(s) => format!("\"{}\"", escape(s)),
        CimValue::Reference { path } => format!("\"{}\"", escape(&path.to_string())),
        CimValue::Array(items) => {
            let inner: Vec<String> = items.iter().map(value_to_mof).collect();
            format!("{{{}}}", inner.join(", "))
        }
        other => other.to_string(),
    }
}

fn qualifiers_to_mof(quals: &QualifierSet, indent: &str) -> Option<String> {
    if quals.is_empty() {
        return None;
    }
    let parts: Vec<String> = quals
        .iter()
        .map(|(name, value)| match value {
            CimValue::Boolean(true) => name.clone(),
            other => format!("{name} ( {} )", value_to_mof(other)),
        })
        .collect();
    Some(format!("{indent}[{}]", parts.join(",\n ")))
}

fn type_decl(cim_type: &str, reference_class: Option<&str>) -> String {
    match reference_class {
        Some(rc) => format!("{rc} REF"),
        None => cim_type.to_string(),
    }
}

pub fn class_to_mof(cls: &CimClass) -> String {
    let mut out = String::new();
    if let Some(q) = qualifiers_to_mof(&cls.qualifiers, "") {
        out.push_str(&q);
        out.push('\n');
    }
    match &cls.superclass {
        Some(sup) => out.push_str(&format!("class {} : {} {{\n", cls.classname, sup)),
        None => out.push_str(&format!("class {} {{\n", cls.classname)),
    }
    for p in &cls.properties {
        out.push('\n');
        if let Some(q) = qualifiers_to_mof(&p.qualifiers, "      ") {
            out.push_str(&q);
            out.push('\n');
        }
        let array = if p.is_array { "[]" } else { "" };
        out.push_str(&format!(
            "{INDENT}{} {}{array}",
            type_decl(&p.cim_type, p.reference_class.as_deref()),
            p.name
        ));
        if let Some(v) = &p.value {
            out.push_str(&format!(" = {}", value_to_mof(v)));
        }
        out.push_str(";\n");
    }
    for m in &cls.methods {
        out.push('\n');
        if let Some(q) = qualifiers_to_mof(&m.qualifiers, "      ") {
            out.push_str(&q);
            out.push('\n');
        }
        out.push_str(&format!("{INDENT}{} {}(", m.return_type, m.name));
        for (i, param) in m.parameters.iter().enumerate() {
            out.push('\n');
            if let Some(q) = qualifiers_to_mof(&param.qualifiers, "         ") {
                out.push_str(&q);
                out.push('\n');
            }
            let array = if param.is_array { "[]" } else { "" };
            out.push_str(&format!(
                "{INDENT}{INDENT}{} {}{array}",
                type_decl(&param.cim_type, param.reference_class.as_deref()),
                param.name
            ));
            if i + 1 < m.parameters.len() {
                out.push(',');
            }
        }
        out.push_str(");\n");
    }
    out.push_str("\n};\n");
    out
}

pub fn instance_to_mof(inst: &CimInstance) -> String {
    let mut out = format!("instance of {} {{\n", inst.classname);
    for (name, value) in &inst.properties {
        let rendered = value
            .as_ref()
            .map(value_to_mof)
            .unwrap_or_else(|| "NULL".to_string());
        out.push_str(&format!("{INDENT}{name} = {rendered};\n"));
    }
    out.push_str("};\n");
    out
}

pub fn qualifier_decl_to_mof(decl: &QualifierDecl) -> String {
    let array = if decl.is_array { "[]" } else { "" };
    let mut out = format!("Qualifier {} : {}{array}", decl.name, decl.cim_type);
    if let Some(v) = &decl.value {
        out.push_str(&format!(" = {}", value_to_mof(v)));
    }
    let scopes: Vec<String> = decl.scopes.iter().map(|s| s.to_string()).collect();
    out.push_str(&format!(",\n{INDENT}Scope({})", scopes.join(", ")));

    let mut flavors = Vec::new();
    match decl.overridable {
        Some(true) => flavors.push("EnableOverride"),
        Some(false) => flavors.push("DisableOverride"),
        None => {}
    }
    match decl.tosubclass {
        Some(true) => flavors.push("ToSubclass"),
        Some(false) => flavors.push("Restricted"),
        None => {}
    }
    if decl.translatable == Some(true) {
        flavors.push("Translatable");
    }
    if !flavors.is_empty() {
        out.push_str(&format!(",\n{INDENT}Flavor({})", flavors.join(", ")));
    }
    out.push_str(";\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cim::model::{CimProperty, ObjectPath, Scope};

    #[test]
    fn class_mof_shows_superclass_and_key() {
        let mut cls = CimClass::new("CIM_Foo_sub");
        cls.superclass = Some("CIM_Foo".into());
        let mut p = CimProperty::new("InstanceID", "string");
        p.qualifiers.insert("Key".into(), CimValue::Boolean(true));
        cls.properties.push(p);
        let mof = class_to_mof(&cls);
        assert!(mof.contains("class CIM_Foo_sub : CIM_Foo {"));
        assert!(mof.contains("[Key]"));
        assert!(mof.contains("string InstanceID;"));
    }

    #[test]
    fn instance_mof_quotes_references() {
        let target = ObjectPath::new("CIM_Foo").with_key("Name", CimValue::string("a"));
        let inst = CimInstance::new("CIM_Assoc").with_property("Ref", CimValue::reference(target));
        let mof = instance_to_mof(&inst);
        assert!(mof.contains(r#"Ref = "CIM_Foo.Name=\"a\"";"#));
    }

    #[test]
    fn qualifier_decl_mof_lists_scopes_and_flavors() {
        let mut decl = QualifierDecl::new("Association", "boolean", vec![Scope::Association]);
        decl.value = Some(CimValue::Boolean(false));
        decl.overridable = Some(false);
        let mof = qualifier_decl_to_mof(&decl);
        assert!(mof.starts_with("Qualifier Association : boolean = false"));
        assert!(mof.contains("Scope(association)"));
        assert!(mof.contains("Flavor(DisableOverride)"));
    }
}
