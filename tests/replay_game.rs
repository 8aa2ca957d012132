use bughouse_analysis::analysis_tree::AnalysisTree;
use bughouse_analysis::clock::{ClockTimeline, DeciSeconds};
use bughouse_analysis::force::Force;
use bughouse_analysis::game::BughouseBoard;
use bughouse_analysis::replay::{
    is_pristine_mainline, load_recorded_game, parse_game_log, LoadError, LoadedGame,
};
use bughouse_analysis::rules::{ApplyOptions, ApplyOutcome, TurnError};
use pretty_assertions::assert_eq;


fn load_log(log: &str) -> LoadedGame {
    let game = parse_game_log(log, DeciSeconds(600)).unwrap();
    load_recorded_game(game).unwrap()
}

const SIX_MOVES: &str = "1A.e4:10 1a.e5:20 1B.d4:30 1b.d5:40 2A.Nf3:50 2a.Nc6:60";


#[test]
fn loaded_game_mainline_matches_the_record() {
    let loaded = load_log(SIX_MOVES);
    assert_eq!(loaded.tree.len(), 7);
    assert!(loaded.is_pristine_mainline());

    let mainline: Vec<String> = loaded
        .tree
        .mainline()
        .skip(1)
        .map(|id| loaded.tree.get(id).unwrap().half_move.as_ref().unwrap().san.clone())
        .collect();
    assert_eq!(mainline, ["e4", "e5", "d4", "d5", "Nf3", "Nc6"]);
}

#[test]
fn truncating_the_mainline_invalidates_live_replay() {
    let mut loaded = load_log(SIX_MOVES);
    let third = loaded.tree.mainline().nth(3).unwrap();
    loaded.tree.truncate_from_inclusive(third).unwrap();
    assert!(!loaded.is_pristine_mainline());
}

#[test]
fn side_variations_do_not_invalidate_live_replay_until_promoted() {
    let mut loaded = load_log(SIX_MOVES);
    let root = loaded.tree.root();
    let position = loaded.tree.get(root).unwrap().position.clone();
    let outcome = position
        .apply_notation(BughouseBoard::A, "a3", &ApplyOptions::default())
        .unwrap();
    let ApplyOutcome::Applied(applied) = outcome else {
        panic!("a3 should apply cleanly");
    };
    let variation = loaded.tree.insert(root, applied.half_move, applied.position).unwrap();

    // Adding a variation leaves the mainline intact.
    assert!(loaded.is_pristine_mainline());

    loaded.tree.promote_variation_one_level(variation).unwrap();
    assert!(!loaded.is_pristine_mainline());
}

#[test]
fn mainline_shorter_or_longer_than_the_record_is_not_pristine() {
    let loaded = load_log(SIX_MOVES);
    let mut shorter = loaded.recorded.moves.clone();
    shorter.pop();
    assert!(!is_pristine_mainline(&loaded.tree, &shorter));

    let mut longer = loaded.recorded.moves.clone();
    longer.push(longer[0].clone());
    assert!(!is_pristine_mainline(&loaded.tree, &longer));
}

#[test]
fn load_rejects_out_of_turn_and_garbage_moves() {
    let game = parse_game_log("1a.e5", DeciSeconds(600)).unwrap();
    assert_eq!(
        load_recorded_game(game).unwrap_err(),
        LoadError::BadMove {
            move_idx: 0,
            error: TurnError::WrongTurnOrder { force: Force::Black },
        }
    );

    let game = parse_game_log("1A.e4 1a.zzz", DeciSeconds(600)).unwrap();
    assert_eq!(
        load_recorded_game(game).unwrap_err(),
        LoadError::BadMove { move_idx: 1, error: TurnError::InvalidNotation }
    );
}

#[test]
fn loaded_timeline_charges_the_shared_clock_axis() {
    let loaded = load_log(SIX_MOVES);
    let timeline = &loaded.timeline;
    assert_eq!(timeline.move_durations(), &[DeciSeconds(10); 6]);

    // After 1A.e4 (t=10) and 1a.e5 (t=20), board B's white has been running for 20
    // deciseconds without having moved at all.
    let after_two = timeline.timeline()[2];
    assert_eq!(after_two[BughouseBoard::B][Force::White], DeciSeconds(580));
    assert_eq!(after_two[BughouseBoard::B][Force::Black], DeciSeconds(600));
    assert_eq!(after_two[BughouseBoard::A][Force::White], DeciSeconds(590));
    assert_eq!(after_two[BughouseBoard::A][Force::Black], DeciSeconds(590));

    // Exactly at a recorded timestamp the continuous query matches the discrete state.
    for (i, &t) in timeline.monotonic_timestamps().iter().enumerate() {
        assert_eq!(timeline.clocks_at(t), timeline.timeline()[i + 1]);
    }
}

#[test]
fn regressed_timestamps_are_repaired_not_rejected() {
    let loaded = load_log("1A.e4:50 1a.e5:30");
    assert_eq!(
        loaded.timeline.monotonic_timestamps(),
        &[DeciSeconds(50), DeciSeconds(50)]
    );
    assert_eq!(loaded.timeline.meta().non_monotonic_move_timestamps, 1);
    assert_eq!(loaded.timeline.meta().clamped_to_zero_events, 0);
}

#[test]
fn tree_and_timeline_survive_a_serde_round_trip() {
    let loaded = load_log(SIX_MOVES);

    let json = serde_json::to_string(&loaded.tree).unwrap();
    let tree: AnalysisTree = serde_json::from_str(&json).unwrap();
    assert_eq!(tree, loaded.tree);

    let json = serde_json::to_string(&loaded.timeline).unwrap();
    let timeline: ClockTimeline = serde_json::from_str(&json).unwrap();
    assert_eq!(timeline, loaded.timeline);
}
