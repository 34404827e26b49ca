//! Property tests for capsule splitting.

use habitrack_core::scheduler::split_goal;
use habitrack_core::{
    CapsuleScheduler, ChunkingMode, HabitConfig, ScheduleContext, SchedulerConfig, Unit,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn split_sums_to_goal(tenths in 1u32..5000, count in 1usize..20) {
        let goal = f64::from(tenths) / 10.0;
        let count = count.min(tenths as usize);
        let values = split_goal(goal, count);
        prop_assert_eq!(values.len(), count);
        let total: f64 = values.iter().sum();
        prop_assert!((total - goal).abs() < 1e-6, "sum {} != goal {}", total, goal);
        prop_assert!(values.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn auto_capsules_are_deterministic_and_capped(
        tenths in 1u32..3000,
        carryover_tenths in 0u32..200,
        neurodivergent in any::<bool>(),
        max_capsules in 1u32..15,
    ) {
        let goal = f64::from(tenths) / 10.0;
        let carryover = f64::from(carryover_tenths) / 10.0;
        let scheduler = CapsuleScheduler::with_config(SchedulerConfig {
            neurodivergent_mode: neurodivergent,
            max_capsules,
        });
        let habit = HabitConfig::timer("read", "Read", goal);
        let ctx = ScheduleContext { carryover, completions: &[] };

        let first = scheduler.capsules(&habit, ctx);
        let second = scheduler.capsules(&habit, ctx);
        prop_assert_eq!(&first, &second);
        prop_assert!(!first.is_empty());
        prop_assert!(first.len() <= max_capsules as usize);

        let total: f64 = first.iter().map(|c| c.target_value).sum();
        prop_assert!((total - goal - carryover).abs() < 1e-6);
    }

    #[test]
    fn by_parts_keeps_the_requested_count(parts in 1u32..40, max_capsules in 1u32..15) {
        let scheduler = CapsuleScheduler::with_config(SchedulerConfig {
            neurodivergent_mode: false,
            max_capsules,
        });
        let mut habit = HabitConfig::timer("read", "Read", 100.0);
        habit.chunking_mode = ChunkingMode::ByParts;
        habit.preferred_chunk_count = Some(parts);
        let capsules = scheduler.capsules(&habit, ScheduleContext::default());
        prop_assert_eq!(capsules.len(), parts as usize);
    }

    #[test]
    fn counted_habits_split_into_whole_tenths(count in 1u32..200) {
        let habit = HabitConfig::counted("pushups", "Push-ups", Unit::Reps, f64::from(count));
        let capsules = CapsuleScheduler::new()
            .capsules(&habit, ScheduleContext { carryover: 0.0, completions: &[] });
        for capsule in &capsules {
            let scaled = capsule.target_value * 10.0;
            prop_assert!((scaled - scaled.round()).abs() < 1e-6);
        }
    }
}
