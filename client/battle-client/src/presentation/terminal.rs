use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{Destination, ErrorView, Navigator, Presenter};
use crate::models::{BattleState, GameSession, Health, Question, Urgency};
use crate::services::sequencer::{Combatant, PresentationStep};
use crate::services::UserAction;

const BAR_WIDTH: usize = 20;

/// Line-oriented rendering on stdout.
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    round: Arc<AtomicU64>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Round of the question on screen, for tagging typed answers.
    pub fn round_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.round)
    }

    fn print(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    }
}

fn bar(label: &str, health: Health) -> String {
    let filled = ((health.percent() / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!(
        "{:<8} [{}{}] {}/{}",
        label,
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        health.current(),
        health.max()
    )
}

impl Presenter for TerminalPresenter {
    fn session_started(&self, session: &GameSession, state: &BattleState) {
        self.print("=== Battle started ===");
        self.print(&format!(
            "Difficulty: {} | Session: {}",
            session.difficulty, session.session_id
        ));
        self.print(&format!(
            "Player Lv.{} (ATK {}) vs Monster Lv.{} | Reward: {} coins",
            session.player_stats.level,
            session.player_stats.atk,
            session.monster_stats.level,
            session.monster_stats.money_win
        ));
        self.print(&bar("Player", state.player));
        self.print(&bar("Monster", state.monster));
    }

    fn question_loaded(&self, question: &Question, round: u64) {
        self.round.store(round, Ordering::SeqCst);
        self.print("");
        self.print(&format!("[Round {}] {}", round, question.kind.label()));
        match &question.blank {
            Some(blank) => {
                self.print(&blank.instruction);
                self.print(&format!(
                    "  {} ______ {}",
                    blank.sentence_before, blank.sentence_after
                ));
            }
            None => self.print(&question.text),
        }
        for (index, choice) in question.choices.iter().enumerate() {
            self.print(&format!("  {}) {}", index + 1, choice));
        }
        let hint = if question.has_hint() { ", /h hint" } else { "" };
        self.print(&format!("(type your answer{}, /r retry, /q leave)", hint));
    }

    fn timer_changed(&self, remaining_seconds: u32, urgency: Urgency) {
        let show = match urgency {
            Urgency::Normal => remaining_seconds % 10 == 0,
            Urgency::Warning => remaining_seconds == 10,
            Urgency::Danger => true,
        };
        if show {
            self.print(&format!(
                "[time] {}s ({})",
                remaining_seconds,
                urgency.as_str()
            ));
        }
    }

    fn input_enabled(&self, enabled: bool) {
        if enabled {
            let mut out = std::io::stdout().lock();
            let _ = write!(out, "> ");
            let _ = out.flush();
        }
    }

    fn hint_toggled(&self, hint: Option<&str>) {
        match hint {
            Some(hint) => self.print(&format!("Hint: {}", hint)),
            None => self.print("(hint hidden)"),
        }
    }

    fn step(&self, step: &PresentationStep) {
        match step {
            PresentationStep::Verdict {
                correct, feedback, ..
            } => {
                let verdict = if *correct { "Correct!" } else { "Wrong!" };
                match feedback {
                    Some(feedback) => self.print(&format!("{} {}", verdict, feedback)),
                    None => self.print(verdict),
                }
            }
            PresentationStep::Attack { attacker } => match attacker {
                Combatant::Player => self.print("You attack the monster!"),
                Combatant::Monster => self.print("The monster attacks you!"),
            },
            PresentationStep::HealthChanged {
                player,
                monster,
                target,
                damage,
            } => {
                if *damage > 0 {
                    let who = match target {
                        Combatant::Player => "You take",
                        Combatant::Monster => "Monster takes",
                    };
                    self.print(&format!("{} {} damage", who, damage));
                }
                self.print(&bar("Player", *player));
                self.print(&bar("Monster", *monster));
            }
            PresentationStep::Cooldown => {}
            PresentationStep::NextQuestion => self.print("Next question..."),
            PresentationStep::GameEnd { outcome } => {
                self.print("");
                self.print(&outcome.message());
            }
        }
    }

    fn notice(&self, message: &str) {
        self.print(message);
    }

    fn error(&self, error: &ErrorView) {
        if error.retryable {
            self.print(&format!("Error: {} (/r to retry)", error.message));
        } else {
            self.print(&format!("Error: {}", error.message));
        }
    }
}

#[derive(Debug, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, destination: Destination) {
        tracing::info!("Navigating to {}", destination.path());
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "Navigating to {}", destination.path());
    }
}

/// Maps one line of terminal input onto a user action.
pub fn parse_command(line: &str, round: u64) -> UserAction {
    match line.trim() {
        "/h" | "/hint" => UserAction::ToggleHint,
        "/r" | "/retry" => UserAction::Retry,
        "/q" | "/quit" | "/leave" => UserAction::Leave,
        _ => UserAction::Answer {
            round,
            text: line.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_slash_prefixed() {
        assert_eq!(parse_command("/h", 3), UserAction::ToggleHint);
        assert_eq!(parse_command(" /q ", 3), UserAction::Leave);
        assert_eq!(parse_command("/retry", 3), UserAction::Retry);
        assert_eq!(
            parse_command("h", 3),
            UserAction::Answer {
                round: 3,
                text: "h".to_string()
            }
        );
    }

    #[test]
    fn bar_scales_to_width() {
        assert_eq!(
            bar("Monster", Health::new(25, 50)),
            format!("Monster  [{}{}] 25/50", "#".repeat(10), "-".repeat(10))
        );
        assert!(bar("Player", Health::full(0)).ends_with("0/0"));
    }
}
