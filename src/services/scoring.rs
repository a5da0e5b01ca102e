//! Pure scoring for a single question plus the shared leaderboard ordering.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::dao::models::{AnswerEntity, PlayerEntity};

/// Flat award for any correct answer.
pub const CORRECT_BASE_POINTS: i32 = 10;
/// Positional speed bonuses for the fastest correct answers, earliest first.
pub const SPEED_BONUS_POINTS: [i32; 5] = [5, 4, 3, 2, 1];

/// Compute the per-player awards for one question.
///
/// Every correct answer earns [`CORRECT_BASE_POINTS`]; the first
/// [`SPEED_BONUS_POINTS`]`.len()` correct answers in ascending timestamp
/// order additionally earn the positional bonus. Incorrect answers earn
/// nothing and absent players are unaffected.
pub fn score_question(answers: &[AnswerEntity]) -> HashMap<String, i32> {
    let mut correct: Vec<&AnswerEntity> = answers.iter().filter(|a| a.is_correct).collect();
    // Stable sort: identical timestamps keep their recorded arrival order.
    correct.sort_by(|a, b| {
        a.timestamp
            .partial_cmp(&b.timestamp)
            .unwrap_or(Ordering::Equal)
    });

    let mut awards: HashMap<String, i32> = HashMap::new();
    for answer in &correct {
        *awards.entry(answer.player_id.clone()).or_insert(0) += CORRECT_BASE_POINTS;
    }
    for (position, answer) in correct.iter().take(SPEED_BONUS_POINTS.len()).enumerate() {
        *awards.entry(answer.player_id.clone()).or_insert(0) += SPEED_BONUS_POINTS[position];
    }

    awards
}

/// Leaderboard ordering used for every ranking in the game: score
/// descending, then username ascending case-insensitively. Tiebreak
/// detection uses the same comparator, so ties are always exact-score ties.
pub fn sort_leaderboard(players: &[PlayerEntity]) -> Vec<PlayerEntity> {
    let mut ranked = players.to_vec();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.username.to_lowercase().cmp(&b.username.to_lowercase()))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correct_answer(player: &str, ts: f64) -> AnswerEntity {
        AnswerEntity {
            session_id: "s".into(),
            player_id: player.into(),
            question_id: "q".into(),
            option_index: 1,
            is_correct: true,
            timestamp: ts,
        }
    }

    fn wrong_answer(player: &str, ts: f64) -> AnswerEntity {
        AnswerEntity {
            is_correct: false,
            ..correct_answer(player, ts)
        }
    }

    fn player(username: &str, score: i32) -> PlayerEntity {
        PlayerEntity {
            id: username.to_lowercase(),
            username: username.into(),
            score,
            is_tied_finalist: false,
        }
    }

    #[test]
    fn first_five_correct_answers_earn_descending_bonuses() {
        let answers = vec![
            correct_answer("p1", 1.0),
            correct_answer("p2", 2.0),
            correct_answer("p3", 3.0),
            correct_answer("p4", 4.0),
            correct_answer("p5", 5.0),
            correct_answer("p6", 6.0),
            wrong_answer("p7", 0.5),
        ];

        let awards = score_question(&answers);
        assert_eq!(awards["p1"], CORRECT_BASE_POINTS + 5);
        assert_eq!(awards["p2"], CORRECT_BASE_POINTS + 4);
        assert_eq!(awards["p3"], CORRECT_BASE_POINTS + 3);
        assert_eq!(awards["p4"], CORRECT_BASE_POINTS + 2);
        assert_eq!(awards["p5"], CORRECT_BASE_POINTS + 1);
        assert_eq!(awards["p6"], CORRECT_BASE_POINTS);
        assert!(!awards.contains_key("p7"));
    }

    #[test]
    fn answers_are_ranked_by_timestamp_not_arrival() {
        let answers = vec![correct_answer("late", 9.0), correct_answer("early", 1.0)];

        let awards = score_question(&answers);
        assert_eq!(awards["early"], CORRECT_BASE_POINTS + 5);
        assert_eq!(awards["late"], CORRECT_BASE_POINTS + 4);
    }

    #[test]
    fn no_correct_answers_yields_no_awards() {
        let answers = vec![wrong_answer("p1", 1.0)];
        assert!(score_question(&answers).is_empty());
    }

    #[test]
    fn leaderboard_breaks_score_ties_alphabetically_case_insensitive() {
        let players = vec![player("bob", 10), player("Ana", 10), player("cyd", 7)];

        let ranked = sort_leaderboard(&players);
        let order: Vec<&str> = ranked.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(order, vec!["Ana", "bob", "cyd"]);
    }

    #[test]
    fn leaderboard_is_score_descending() {
        let players = vec![player("low", 1), player("high", 30), player("mid", 12)];

        let ranked = sort_leaderboard(&players);
        let scores: Vec<i32> = ranked.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![30, 12, 1]);
    }
}
