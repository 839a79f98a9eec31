//! Peer-review battle rules.
//!
//! The author's paper starts with hit points equal to its draft score and
//! Reviewer #2 starts with the journal's difficulty. Each turn the author
//! plays one [`AuthorMove`]; if the reviewer is still standing it strikes
//! back with a [`ReviewerComplaint`]. The paper is rejected when its hit
//! points run out and accepted when the reviewer's do.
//!
//! ```
//! use cfdlab_logic::research::{DraftPaper, Journal};
//! use cfdlab_logic::review::{AuthorMove, ReviewBattle, Verdict};
//! use cfdlab_logic::sampler::ScriptedDraws;
//!
//! let mut battle = ReviewBattle::start(Journal::OpenAccess, DraftPaper { score: 240 });
//! // Concession lands (draw < 0.5) for 100 damage against 50 resolve.
//! let turn = battle.play(AuthorMove::ConcedeError, &mut ScriptedDraws::constant(0.1)).unwrap();
//! assert_eq!(turn.verdict, Verdict::Accepted);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::research::{DraftPaper, Journal};
use crate::sampler::Sampler;

/// Funds spent on one round of extra experiments.
pub const EXPERIMENT_COST: i64 = 1000;
/// Reputation granted on acceptance.
pub const ACCEPTANCE_REPUTATION: i64 = 50;
/// Funds granted on acceptance.
pub const ACCEPTANCE_FUNDS: i64 = 5000;

const CITE_DAMAGE: (i32, i32) = (20, 50);
const EXPERIMENT_HEAL: (i32, i32) = (30, 60);
const CONCESSION_DAMAGE: i32 = 100;
const CONCESSION_BACKFIRE: i32 = 50;
const CONCESSION_ODDS: f64 = 0.5;
const REVIEWER_DAMAGE: (i32, i32) = (15, 40);

/// What the author can do on their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorMove {
    /// Lean on the classics. Always hurts the reviewer.
    CiteClassics,
    /// Run more experiments overnight. Heals the paper, costs funds.
    AddExperiments,
    /// Admit the discrepancy is numerical error. A coin flip.
    ConcedeError,
}

impl AuthorMove {
    pub const ALL: [AuthorMove; 3] = [
        AuthorMove::CiteClassics,
        AuthorMove::AddExperiments,
        AuthorMove::ConcedeError,
    ];

    /// Funds the caller must pay before playing this move.
    pub fn funds_cost(self) -> i64 {
        match self {
            AuthorMove::AddExperiments => EXPERIMENT_COST,
            _ => 0,
        }
    }
}

/// Reviewer #2's objections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewerComplaint {
    MeshIndependence,
    TurbulenceModel,
    Typo,
    Novelty,
}

impl ReviewerComplaint {
    pub const ALL: [ReviewerComplaint; 4] = [
        ReviewerComplaint::MeshIndependence,
        ReviewerComplaint::TurbulenceModel,
        ReviewerComplaint::Typo,
        ReviewerComplaint::Novelty,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            ReviewerComplaint::MeshIndependence => "questions your mesh independence study",
            ReviewerComplaint::TurbulenceModel => "disputes the turbulence model",
            ReviewerComplaint::Typo => "found a typo",
            ReviewerComplaint::Novelty => "sees insufficient novelty",
        }
    }
}

/// Immediate effect of the author's move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveEffect {
    ReviewerDamaged(i32),
    PaperHealed(i32),
    ConcessionBackfired(i32),
}

/// The reviewer's counterattack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerStrike {
    pub complaint: ReviewerComplaint,
    pub damage: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pending,
    Accepted,
    Rejected,
}

/// Everything that happened in one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    pub author_move: AuthorMove,
    pub effect: MoveEffect,
    pub strike: Option<ReviewerStrike>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("the review is already decided ({0:?})")]
    Decided(Verdict),
}

/// State of one submission's review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewBattle {
    pub journal: Journal,
    pub author_hp: i32,
    pub reviewer_hp: i32,
    pub turns: u32,
}

impl ReviewBattle {
    pub fn start(journal: Journal, draft: DraftPaper) -> Self {
        Self {
            journal,
            author_hp: draft.score.min(i32::MAX as u32) as i32,
            reviewer_hp: journal.difficulty(),
            turns: 0,
        }
    }

    /// A rejected paper stays rejected even if the reviewer also fell.
    pub fn verdict(&self) -> Verdict {
        if self.author_hp <= 0 {
            Verdict::Rejected
        } else if self.reviewer_hp <= 0 {
            Verdict::Accepted
        } else {
            Verdict::Pending
        }
    }

    /// Play one author move and the reviewer's reply.
    pub fn play(
        &mut self,
        author_move: AuthorMove,
        sampler: &mut impl Sampler,
    ) -> Result<TurnReport, ReviewError> {
        let verdict = self.verdict();
        if verdict != Verdict::Pending {
            return Err(ReviewError::Decided(verdict));
        }

        let effect = match author_move {
            AuthorMove::CiteClassics => {
                let dmg = sampler.range_inclusive(CITE_DAMAGE.0, CITE_DAMAGE.1);
                self.reviewer_hp -= dmg;
                MoveEffect::ReviewerDamaged(dmg)
            }
            AuthorMove::AddExperiments => {
                let heal = sampler.range_inclusive(EXPERIMENT_HEAL.0, EXPERIMENT_HEAL.1);
                self.author_hp += heal;
                MoveEffect::PaperHealed(heal)
            }
            AuthorMove::ConcedeError => {
                if sampler.chance(CONCESSION_ODDS) {
                    self.reviewer_hp -= CONCESSION_DAMAGE;
                    MoveEffect::ReviewerDamaged(CONCESSION_DAMAGE)
                } else {
                    self.author_hp -= CONCESSION_BACKFIRE;
                    MoveEffect::ConcessionBackfired(CONCESSION_BACKFIRE)
                }
            }
        };

        let strike = if self.reviewer_hp > 0 {
            let damage = sampler.range_inclusive(REVIEWER_DAMAGE.0, REVIEWER_DAMAGE.1);
            let complaint = ReviewerComplaint::ALL[sampler.pick(ReviewerComplaint::ALL.len())];
            self.author_hp -= damage;
            Some(ReviewerStrike { complaint, damage })
        } else {
            None
        };

        self.turns += 1;
        Ok(TurnReport {
            author_move,
            effect,
            strike,
            verdict: self.verdict(),
        })
    }
}
