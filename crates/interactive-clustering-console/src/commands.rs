use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::actions::{ButtonId, ButtonStatus};
use crate::client::{CommandClient, CommandReply};
use crate::error::{Error, Result};
use crate::sink::ActionSink;
use crate::status::error_detail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineCommand {
    Modelization,
    Sampling,
    Clustering,
    NextIteration,
}

impl PipelineCommand {
    pub const ALL: [PipelineCommand; 4] = [
        PipelineCommand::Modelization,
        PipelineCommand::Sampling,
        PipelineCommand::Clustering,
        PipelineCommand::NextIteration,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PipelineCommand::Modelization => "modelization",
            PipelineCommand::Sampling => "sampling",
            PipelineCommand::Clustering => "clustering",
            PipelineCommand::NextIteration => "next-iteration",
        }
    }

    /// Last segment of `POST /api/projects/{id}/...`.
    pub fn path_segment(self) -> &'static str {
        match self {
            PipelineCommand::Modelization => "modelization",
            PipelineCommand::Sampling => "sampling",
            PipelineCommand::Clustering => "clustering",
            PipelineCommand::NextIteration => "iterations",
        }
    }

    /// Tasks are accepted asynchronously; a new iteration is created in place.
    pub fn expected_status(self) -> u16 {
        match self {
            PipelineCommand::NextIteration => 201,
            _ => 202,
        }
    }

    /// Buttons blocked while the request is in flight.
    pub fn buttons(self) -> &'static [ButtonId] {
        match self {
            PipelineCommand::Modelization => &[
                ButtonId::RunInitializeModelization,
                ButtonId::RunModelizationUpdate,
            ],
            PipelineCommand::Sampling => &[ButtonId::RunConstraintsSampling],
            PipelineCommand::Clustering => &[ButtonId::RunConstrainedClustering],
            PipelineCommand::NextIteration => &[ButtonId::CreateNextIteration],
        }
    }

    /// The command is offered when any of its buttons is enabled on screen.
    pub fn is_enabled_in(self, view: &crate::view::DashboardView) -> bool {
        self.buttons().iter().any(|b| view.button_enabled(*b))
    }
}

impl fmt::Display for PipelineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PipelineCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        PipelineCommand::ALL
            .into_iter()
            .find(|c| c.key() == key || c.path_segment() == key)
            .ok_or_else(|| Error::msg(format!("unknown pipeline command '{s}'")))
    }
}

/// Block the command's buttons while its request is in flight.
pub fn begin_command(sink: &mut dyn ActionSink, command: PipelineCommand) {
    for button in command.buttons() {
        sink.set_button(*button, ButtonStatus::Wip, true);
    }
}

/// Judge the backend's answer to a command, then reload the view whatever the
/// outcome.
///
/// A refused command is reported through [`ActionSink::show_error`] before the
/// reload and returned as [`Error::Application`].
pub fn finish_command(
    sink: &mut dyn ActionSink,
    project_id: &str,
    command: PipelineCommand,
    reply: Result<CommandReply>,
) -> Result<()> {
    let outcome = reply.and_then(|reply| {
        if reply.status == command.expected_status() {
            Ok(())
        } else {
            Err(Error::Application {
                code: reply.status,
                detail: error_detail(&reply.body),
            })
        }
    });

    match &outcome {
        Ok(()) => tracing::info!(project_id, %command, "pipeline command accepted"),
        Err(err) => {
            tracing::warn!(project_id, %command, error = %err, "pipeline command failed");
            sink.show_error(&err.to_string());
        }
    }
    sink.reload_view();
    outcome
}

/// Block the buttons, post the command, then reload.
pub fn run_command(
    client: &mut dyn CommandClient,
    sink: &mut dyn ActionSink,
    project_id: &str,
    command: PipelineCommand,
) -> Result<()> {
    begin_command(sink, command);
    let reply = client.post_command(project_id, command);
    finish_command(sink, project_id, command, reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::UiAction;
    use crate::sink::RecordingSink;

    struct Scripted {
        reply: Result<CommandReply>,
        posted: Vec<(String, PipelineCommand)>,
    }

    impl CommandClient for Scripted {
        fn post_command(&mut self, project_id: &str, command: PipelineCommand) -> Result<CommandReply> {
            self.posted.push((project_id.to_string(), command));
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(Error::transport(e.to_string())),
            }
        }
    }

    fn scripted(status: u16, body: &str) -> Scripted {
        Scripted {
            reply: Ok(CommandReply {
                status,
                body: body.to_string(),
            }),
            posted: Vec::new(),
        }
    }

    #[test]
    fn accepted_command_blocks_buttons_then_reloads() {
        let mut client = scripted(202, "{}");
        let mut sink = RecordingSink::new();
        run_command(&mut client, &mut sink, "p", PipelineCommand::Modelization).unwrap();
        assert_eq!(
            sink.calls,
            vec![
                UiAction::SetButton {
                    button: ButtonId::RunInitializeModelization,
                    status: ButtonStatus::Wip,
                    disabled: true,
                },
                UiAction::SetButton {
                    button: ButtonId::RunModelizationUpdate,
                    status: ButtonStatus::Wip,
                    disabled: true,
                },
                UiAction::ReloadView,
            ]
        );
        assert!(sink.errors.is_empty());
        assert_eq!(client.posted, vec![("p".to_string(), PipelineCommand::Modelization)]);
    }

    #[test]
    fn next_iteration_expects_created() {
        let mut sink = RecordingSink::new();
        let mut ok = scripted(201, "");
        run_command(&mut ok, &mut sink, "p", PipelineCommand::NextIteration).unwrap();

        let mut wrong = scripted(202, "");
        let err = run_command(&mut wrong, &mut sink, "p", PipelineCommand::NextIteration)
            .unwrap_err();
        assert!(matches!(err, Error::Application { code: 202, .. }));
    }

    #[test]
    fn refused_command_surfaces_detail_and_still_reloads() {
        let mut client = scripted(403, r#"{"detail": "The project must be in sampling state."}"#);
        let mut sink = RecordingSink::new();
        let err = run_command(&mut client, &mut sink, "p", PipelineCommand::Sampling).unwrap_err();
        match err {
            Error::Application { code, detail } => {
                assert_eq!(code, 403);
                assert_eq!(detail, "The project must be in sampling state.");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.errors.len(), 1);
        assert!(sink.errors[0].contains("403"));
        assert_eq!(sink.calls.last(), Some(&UiAction::ReloadView));
    }

    #[test]
    fn transport_failure_is_reported_and_reloads() {
        let mut client = Scripted {
            reply: Err(Error::transport("connection refused")),
            posted: Vec::new(),
        };
        let mut sink = RecordingSink::new();
        let err = run_command(&mut client, &mut sink, "p", PipelineCommand::Clustering).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(sink.reloads(), 1);
    }

    #[test]
    fn commands_parse_from_keys_and_paths() {
        assert_eq!(
            "next-iteration".parse::<PipelineCommand>().unwrap(),
            PipelineCommand::NextIteration
        );
        assert_eq!(
            "iterations".parse::<PipelineCommand>().unwrap(),
            PipelineCommand::NextIteration
        );
        assert_eq!(
            "Next_Iteration".parse::<PipelineCommand>().unwrap(),
            PipelineCommand::NextIteration
        );
        assert!("annotate".parse::<PipelineCommand>().is_err());
    }
}
