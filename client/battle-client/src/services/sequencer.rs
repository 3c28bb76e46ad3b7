//! Round resolution and the ordered presentation pipeline that follows it.
//!
//! `resolve_round` holds all of the health and termination logic and has no
//! notion of time. `plan_steps` turns a resolution into display steps and
//! `Sequencer::play` walks them, waiting each step's settle time.

use std::time::Duration;

use serde::Serialize;

use crate::models::{
    AnswerOrigin, AnswerResult, BattleState, GameOutcome, Health, QuestionType, RoundOutcome,
};
use crate::presentation::Presenter;

/// Monster damage dealt by a correct answer when the backend sends no health.
pub const PLAYER_DAMAGE: u32 = 10;
/// Player damage dealt by a wrong answer when the backend sends no health.
pub const MONSTER_DAMAGE: u32 = 5;

pub const TIMEOUT_FEEDBACK: &str = "Time is up! You took too long to answer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageRules {
    pub player_damage: u32,
    pub monster_damage: u32,
}

impl Default for DamageRules {
    fn default() -> Self {
        Self {
            player_damage: PLAYER_DAMAGE,
            monster_damage: MONSTER_DAMAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResolution {
    pub player: Health,
    pub monster: Health,
    pub outcome: RoundOutcome,
    pub correct: bool,
}

impl RoundResolution {
    pub fn next_state(&self, previous: &BattleState) -> BattleState {
        BattleState {
            player: self.player,
            monster: self.monster,
            reward: previous.reward,
        }
    }
}

/// Computes the next health values and the round outcome.
///
/// Backend health wins over local damage whenever present. A depleted monster
/// is a win even when the player is depleted too.
pub fn resolve_round(
    state: &BattleState,
    result: &AnswerResult,
    rules: &DamageRules,
) -> RoundResolution {
    let correct = result.status.is_correct();

    let monster = match result.monster_hp {
        Some(hp) => state.monster.with_current(hp),
        None if correct => state.monster.damaged(rules.player_damage),
        None => state.monster,
    };
    let player = match result.player_hp {
        Some(hp) => state.player.with_current(hp),
        None if !correct => state.player.damaged(rules.monster_damage),
        None => state.player,
    };

    let outcome = if monster.is_depleted() {
        RoundOutcome::Win {
            reward: state.reward,
        }
    } else if player.is_depleted() {
        RoundOutcome::Lose
    } else {
        RoundOutcome::Continue
    };

    RoundResolution {
        player,
        monster,
        outcome,
        correct,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Combatant {
    Player,
    Monster,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PresentationStep {
    Verdict {
        correct: bool,
        feedback: Option<String>,
        origin: AnswerOrigin,
    },
    Attack {
        attacker: Combatant,
    },
    HealthChanged {
        player: Health,
        monster: Health,
        target: Combatant,
        damage: u32,
    },
    Cooldown,
    NextQuestion,
    GameEnd {
        outcome: GameOutcome,
    },
}

impl PresentationStep {
    pub fn settle_time(&self, timings: &StepTimings) -> Duration {
        match self {
            PresentationStep::Attack { .. } => timings.attack_settle,
            PresentationStep::Cooldown => timings.cooldown,
            PresentationStep::GameEnd { .. } => timings.game_end_delay,
            _ => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTimings {
    pub attack_settle: Duration,
    pub cooldown: Duration,
    pub game_end_delay: Duration,
}

impl Default for StepTimings {
    fn default() -> Self {
        Self {
            attack_settle: Duration::from_millis(300),
            cooldown: Duration::from_millis(1500),
            game_end_delay: Duration::from_millis(500),
        }
    }
}

impl StepTimings {
    pub fn instant() -> Self {
        Self {
            attack_settle: Duration::ZERO,
            cooldown: Duration::ZERO,
            game_end_delay: Duration::ZERO,
        }
    }
}

/// Builds the display pipeline for one resolved round:
/// verdict, attack, health update, then cooldown and next question, or game end.
pub fn plan_steps(
    previous: &BattleState,
    resolution: &RoundResolution,
    result: &AnswerResult,
    kind: QuestionType,
    origin: AnswerOrigin,
) -> Vec<PresentationStep> {
    let feedback = result.feedback.clone().or_else(|| match origin {
        AnswerOrigin::Timeout => Some(TIMEOUT_FEEDBACK.to_string()),
        AnswerOrigin::User => kind.default_feedback(resolution.correct).map(String::from),
    });

    let (attacker, target, damage) = if resolution.correct {
        (
            Combatant::Player,
            Combatant::Monster,
            previous
                .monster
                .current()
                .saturating_sub(resolution.monster.current()),
        )
    } else {
        (
            Combatant::Monster,
            Combatant::Player,
            previous
                .player
                .current()
                .saturating_sub(resolution.player.current()),
        )
    };

    let mut steps = vec![
        PresentationStep::Verdict {
            correct: resolution.correct,
            feedback,
            origin,
        },
        PresentationStep::Attack { attacker },
        PresentationStep::HealthChanged {
            player: resolution.player,
            monster: resolution.monster,
            target,
            damage,
        },
    ];

    match resolution.outcome.terminal() {
        Some(outcome) => steps.push(PresentationStep::GameEnd { outcome }),
        None => {
            steps.push(PresentationStep::Cooldown);
            steps.push(PresentationStep::NextQuestion);
        }
    }

    steps
}

pub struct Sequencer {
    timings: StepTimings,
}

impl Sequencer {
    pub fn new(timings: StepTimings) -> Self {
        Self { timings }
    }

    pub fn timings(&self) -> &StepTimings {
        &self.timings
    }

    /// Hands each step to the presenter in order and waits out its settle time.
    pub async fn play(&self, steps: &[PresentationStep], presenter: &dyn Presenter) {
        for step in steps {
            presenter.step(step);
            let settle = step.settle_time(&self.timings);
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
        }
    }
}
