//! GLSL front end for the headless backend.
//!
//! Sources are parsed and validated with naga, the way a driver compiles them
//! to its own IR. Diagnostics come back in the `ERROR: 0:<line>: <message>`
//! form GL drivers use, and the interface a program exposes is reflected from
//! the validated module.

use crate::gpu::backend::ShaderStage;
use naga::front::glsl::{Frontend, Options};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Module, TypeInner};
use std::error::Error as _;
use std::fmt;

/// One compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based source line, or 0 when the error has no location.
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR: 0:{}: {}", self.line, self.message)
    }
}

/// Renders diagnostics as a driver info log, with the usual summary trailer.
pub fn format_log(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return String::new();
    }
    let mut log: String = diagnostics.iter().map(|d| format!("{d}\n")).collect();
    log.push_str(&format!(
        "{} compilation errors.  No code generated.\n",
        diagnostics.len()
    ));
    log
}

/// What a compiled stage reads, writes and expects to be bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interface {
    /// `in` variables and their locations, ordered by location.
    pub inputs: Vec<(String, u32)>,
    /// Locations of the user-defined `out` variables.
    pub outputs: Vec<u32>,
    /// Uniform block members and opaque uniforms, in declaration order.
    pub uniforms: Vec<String>,
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Parses and validates `source` as one shader stage.
pub fn compile(stage: ShaderStage, source: &str) -> Result<Interface, Vec<Diagnostic>> {
    let mut frontend = Frontend::default();
    let module = frontend
        .parse(&Options::from(naga_stage(stage)), source)
        .map_err(|parse| {
            parse
                .errors
                .iter()
                .map(|e| Diagnostic {
                    line: e.meta.location(source).line_number,
                    message: e.kind.to_string(),
                })
                .collect::<Vec<_>>()
        })?;

    if module.entry_points.is_empty() {
        return Err(vec![Diagnostic {
            line: 0,
            message: "missing entry point function 'main'".to_string(),
        }]);
    }

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| {
            let line = e
                .spans()
                .next()
                .map(|(span, _)| span.location(source).line_number)
                .unwrap_or(0);
            // Validation errors nest; the innermost cause names the problem.
            let mut message = e.as_inner().to_string();
            let mut cause = e.as_inner().source();
            while let Some(inner) = cause {
                message.push_str(": ");
                message.push_str(&inner.to_string());
                cause = inner.source();
            }
            vec![Diagnostic { line, message }]
        })?;

    Ok(reflect(&module))
}

fn location(binding: Option<&Binding>) -> Option<u32> {
    match binding {
        Some(Binding::Location { location, .. }) => Some(*location),
        _ => None,
    }
}

fn reflect(module: &Module) -> Interface {
    let mut interface = Interface::default();

    if let Some(entry) = module.entry_points.first() {
        for argument in &entry.function.arguments {
            if let (Some(name), Some(loc)) = (&argument.name, location(argument.binding.as_ref())) {
                interface.inputs.push((name.clone(), loc));
            }
        }
        interface.inputs.sort_by_key(|(_, loc)| *loc);

        if let Some(result) = &entry.function.result {
            match &module.types[result.ty].inner {
                TypeInner::Struct { members, .. } => interface
                    .outputs
                    .extend(members.iter().filter_map(|m| location(m.binding.as_ref()))),
                _ => interface.outputs.extend(location(result.binding.as_ref())),
            }
        }
    }

    for (_, global) in module.global_variables.iter() {
        match (global.space, &module.types[global.ty].inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members, .. }) => {
                interface
                    .uniforms
                    .extend(members.iter().filter_map(|m| m.name.clone()));
            }
            (AddressSpace::Uniform | AddressSpace::Handle, _) => {
                interface.uniforms.extend(global.name.clone());
            }
            _ => {}
        }
    }
    interface
}
