//! The nuXmv-backed [`VerificationBackend`]: renders a formula to an SMV module, shells
//! out to `nuxmv -source <cmd-file> <smv-file>`, and classifies the transcript.
//!
//! `pycolite.nuxmv`'s own trace parser is an unimplemented stub in every revision of the
//! source; [`derive_valuation_from_trace`] and [`build_module_from_trace`] below are
//! written directly from the specification's prose (§4.10) rather than adapted from code.

use std::io::Write;
use std::process::Command;

use indexmap::IndexMap;

use crate::ast::{Constant, Formula, Literal};
use crate::config::ToolPaths;
use crate::error::{ContractError, ContractResult};
use crate::printer::{self, PrintOptions};
use crate::registry::{AttributeRegistry, ContextId};
use crate::symbols::NusmvSymbolSet;
use crate::types::Type;

use super::{Verdict, VerificationBackend};

/// The fixed BMC horizon used by every query (§4.10).
pub const BMC_BOUND: u32 = 20;

const COMMAND_FILE_CONTENT: &str = "set on_failure_script_quits\n\
set cone_of_influence\n\
go_msat\n\
build_simplified_property -n 0\n\
msat_check_ltlspec_bmc -n 1 -k 20\n\
quit\n";

/// A staged file's location: `Scratch` removes it on drop, `Kept` left it on disk (debug
/// flag set) and owns a plain `PathBuf` instead.
enum StagedPath {
    Scratch(tempfile::TempPath),
    Kept(std::path::PathBuf),
}

impl std::ops::Deref for StagedPath {
    type Target = std::path::Path;

    fn deref(&self) -> &Self::Target {
        match self {
            StagedPath::Scratch(path) => path,
            StagedPath::Kept(path) => path,
        }
    }
}

pub struct NuxmvBackend {
    tool_paths: ToolPaths,
}

impl NuxmvBackend {
    pub fn new(tool_paths: ToolPaths) -> Self {
        NuxmvBackend { tool_paths }
    }

    fn render_module(&self, formula: &Formula) -> String {
        let options = PrintOptions {
            ignore_precedence: true,
            with_base_names: false,
        };
        let mut declarations = String::new();
        for literal in formula.literals().values() {
            let kind = if literal.ltype().is_frozen() {
                "FROZENVAR"
            } else {
                "VAR"
            };
            declarations.push_str(&format!(
                "    {kind} {} : {};\n",
                literal.unique_name(),
                literal.ltype()
            ));
        }
        let spec = printer::print(formula, &NusmvSymbolSet, options);
        format!("MODULE main()\n{declarations}LTLSPEC (\n    {spec}\n);\n")
    }

    fn stage_files(&self, module: &str) -> ContractResult<(StagedPath, StagedPath)> {
        let smv = tempfile::Builder::new()
            .prefix("contract-")
            .suffix(".smv")
            .tempfile_in(&self.tool_paths.temp_dir)?;
        let cmd = tempfile::Builder::new()
            .prefix("contract-")
            .suffix(".cmd")
            .tempfile_in(&self.tool_paths.temp_dir)?;

        let (mut smv_file, smv_path) = smv.into_parts();
        let (mut cmd_file, cmd_path) = cmd.into_parts();
        smv_file.write_all(module.as_bytes())?;
        cmd_file.write_all(COMMAND_FILE_CONTENT.as_bytes())?;

        if self.tool_paths.keep_temp_files {
            Ok((
                StagedPath::Kept(smv_path.keep().map_err(|e| e.error)?),
                StagedPath::Kept(cmd_path.keep().map_err(|e| e.error)?),
            ))
        } else {
            Ok((StagedPath::Scratch(smv_path), StagedPath::Scratch(cmd_path)))
        }
    }

    fn classify(transcript: &str) -> Verdict {
        if transcript.ends_with("is true\n") {
            return Verdict::Holds;
        }
        let last_line = transcript.lines().last().unwrap_or("");
        if last_line.starts_with("-- Cannot verify the property")
            || last_line.starts_with("-- terminating with bound 20.")
            || last_line.starts_with("-- no counterexample found with bound 20")
        {
            return Verdict::Holds;
        }
        Verdict::Fails
    }
}

impl VerificationBackend for NuxmvBackend {
    fn check_tautology(&self, formula: &Formula) -> ContractResult<Verdict> {
        let module = self.render_module(formula);
        let (smv_path, cmd_path) = self.stage_files(&module)?;

        if !self.tool_paths.nuxmv.is_file() {
            return Err(ContractError::ToolNotFound {
                path: self.tool_paths.nuxmv.clone(),
            });
        }

        let output = Command::new(&self.tool_paths.nuxmv)
            .arg("-source")
            .arg(&*cmd_path)
            .arg(&*smv_path)
            .output()?;

        if !output.status.success() && output.stdout.is_empty() {
            return Err(ContractError::ModelCheckerFailure {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let mut transcript = String::from_utf8_lossy(&output.stdout).into_owned();
        transcript.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(Self::classify(&transcript))
    }
}

/// `ltl2smv` post-processing (§4.10): inserts extra variable declarations before the
/// translator's own `VAR` block, prefixes each of its variable lines with `VAR`, and
/// appends `ports` as module parameters on the top line.
pub fn post_process_ltl2smv(translator_output: &str, extra_declarations: &str, ports: &[String]) -> String {
    let mut lines = translator_output.lines();
    let top_line = lines.next().unwrap_or("MODULE main");
    let parameters = if ports.is_empty() {
        String::new()
    } else {
        format!("({})", ports.join(", "))
    };
    let mut result = format!("{top_line}{parameters}\n{extra_declarations}");
    for line in lines {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            result.push_str(line);
            result.push('\n');
        } else {
            result.push_str("VAR ");
            result.push_str(line);
            result.push('\n');
        }
    }
    result
}

/// One parsed state of a counter-example trace: the full (inherited) assignment at that
/// step, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TraceState {
    pub assignment: IndexMap<String, String>,
}

fn parse_trace_states(trace: &str) -> (Vec<TraceState>, Option<usize>) {
    let mut states: Vec<TraceState> = Vec::new();
    let mut loop_start = None;
    let mut current: Option<TraceState> = None;

    for line in trace.lines() {
        let trimmed = line.trim();
        if trimmed == "-- Loop starts here" {
            loop_start = Some(states.len());
            continue;
        }
        if trimmed.starts_with("-> State:") {
            if let Some(state) = current.take() {
                states.push(state);
            }
            let inherited = states.last().cloned().unwrap_or_default();
            current = Some(inherited);
            continue;
        }
        if let Some((name, value)) = trimmed.split_once('=') {
            if let Some(state) = current.as_mut() {
                state
                    .assignment
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
    if let Some(state) = current.take() {
        states.push(state);
    }
    (states, loop_start)
}

/// Walks a nuXmv counter-example trace and produces the conjunction-of-nexted-states
/// formula described in §4.10, unrolling the lasso body (if any) until `max_horizon`.
pub fn derive_valuation_from_trace(
    registry: &AttributeRegistry,
    context: ContextId,
    trace: &str,
    variables: &[(String, Type)],
    max_horizon: Option<usize>,
) -> Formula {
    let (mut states, loop_start) = parse_trace_states(trace);
    if let (Some(start), Some(horizon)) = (loop_start, max_horizon) {
        while states.len() < horizon {
            let lasso_body = states[start..].to_vec();
            if lasso_body.is_empty() {
                break;
            }
            states.extend(lasso_body);
        }
        states.truncate(horizon);
    }

    let mut whole: Option<Formula> = None;
    for (index, state) in states.iter().enumerate() {
        let mut per_state: Option<Formula> = None;
        for (name, ltype) in variables {
            let Some(value) = state.assignment.get(name) else {
                continue;
            };
            let rhs = match ltype {
                Type::Bool | Type::FrozenBool => {
                    if value.eq_ignore_ascii_case("TRUE") {
                        Formula::True
                    } else {
                        Formula::False
                    }
                }
                Type::Int { .. } | Type::FrozenInt { .. } => {
                    Formula::Constant(Constant::Int(value.parse().unwrap_or(0)))
                }
                Type::Float => Formula::Constant(Constant::Float(value.parse().unwrap_or(0.0))),
            };
            let equality = equality_with(registry, context, name, ltype, rhs);
            per_state = Some(match per_state {
                Some(acc) => Formula::binary(crate::ast::BinaryKind::And, acc, equality, false),
                None => equality,
            });
        }
        if let Some(mut clause) = per_state {
            for _ in 0..index {
                clause = Formula::next(clause);
            }
            whole = Some(match whole {
                Some(acc) => Formula::binary(crate::ast::BinaryKind::And, acc, clause, false),
                None => clause,
            });
        }
    }
    whole.unwrap_or(Formula::True)
}

/// Builds a `variable ≡ value` (or its negation, for booleans) equality term. The literal
/// is allocated fresh from `registry`/`context` purely for rendering; this formula is
/// never merged with any other, so its ordinal is irrelevant to identity, only to text.
fn equality_with(
    registry: &AttributeRegistry,
    context: ContextId,
    name: &str,
    ltype: &Type,
    rhs: Formula,
) -> Formula {
    let literal = Formula::literal(Literal::new(registry, context, name, ltype.clone()));
    match ltype {
        Type::Bool | Type::FrozenBool => match rhs {
            Formula::True => literal,
            _ => Formula::not(literal),
        },
        _ => Formula::binary(crate::ast::BinaryKind::Equality, literal, rhs, false),
    }
}

/// Builds an SMV module encoding `trace` as an explicit state machine (§4.10): an integer
/// `state` variable, an `INIT` pinning state 1, one `TRANS` per state (the lasso step jumps
/// back to the loop start instead of incrementing), and a final self-loop.
pub fn build_module_from_trace(trace: &str, variables: &[(String, Type)], name: &str) -> String {
    let (states, loop_start) = parse_trace_states(trace);
    let mut body = format!("MODULE {name}()\n    VAR state : 1..{};\n", states.len().max(1));
    for (var, ltype) in variables {
        body.push_str(&format!("    VAR {var} : {ltype};\n"));
    }

    if let Some(first) = states.first() {
        let mut init_terms = vec!["state = 1".to_string()];
        for (name, _) in variables {
            if let Some(value) = first.assignment.get(name) {
                init_terms.push(format!("{name} = {value}"));
            }
        }
        body.push_str(&format!("    INIT {};\n", init_terms.join(" & ")));
    }

    for (index, state) in states.iter().enumerate() {
        let next_index = if index + 1 == states.len() {
            loop_start.map(|s| s + 1).unwrap_or(states.len())
        } else {
            index + 2
        };
        let mut terms = vec![format!("state = {}", index + 1), format!("next(state) = {next_index}")];
        for (var, _) in variables {
            if let Some(value) = state.assignment.get(var) {
                terms.push(format!("next({var}) = {value}"));
            }
        }
        body.push_str(&format!("    TRANS {};\n", terms.join(" & ")));
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognises_true_suffix() {
        assert_eq!(NuxmvBackend::classify("...\nis true\n"), Verdict::Holds);
    }

    #[test]
    fn classify_recognises_bounded_inconclusive() {
        assert_eq!(
            NuxmvBackend::classify("...\n-- terminating with bound 20.\n"),
            Verdict::Holds
        );
    }

    #[test]
    fn classify_treats_everything_else_as_counterexample() {
        assert_eq!(NuxmvBackend::classify("...\nis false\n"), Verdict::Fails);
    }

    #[test]
    fn parse_trace_states_inherits_unseen_variables() {
        let trace = "Trace Type: Counterexample\n\
                      -> State: 1.1 <-\n  a = TRUE\n  b = FALSE\n\
                      -> State: 1.2 <-\n  a = FALSE\n";
        let (states, loop_start) = parse_trace_states(trace);
        assert_eq!(states.len(), 2);
        assert_eq!(states[1].assignment["b"], "FALSE");
        assert_eq!(states[1].assignment["a"], "FALSE");
        assert!(loop_start.is_none());
    }

    #[test]
    fn post_process_appends_ports_and_prefixes_var_lines() {
        let translated = "MODULE formula\na : boolean;\nb : boolean;\n";
        let out = post_process_ltl2smv(translated, "VAR extra : boolean;\n", &["a".to_string()]);
        assert!(out.starts_with("MODULE formula(a)\n"));
        assert!(out.contains("VAR a : boolean;"));
    }
}
