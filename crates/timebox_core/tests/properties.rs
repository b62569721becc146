mod support;

use jiff::civil::{date, Date};
use jiff::{Timestamp, ToSpan};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use support::{now, service, today, TestService};
use timebox_core::engine::ordering::Partitioned;
use timebox_core::{
    open_db_in_memory, ManualClock, PrioritySymbol, StatusChange, Task, TaskStatus,
};

const SEEDS: [u64; 4] = [1, 7, 42, 2025];

fn june_day(rng: &mut StdRng, from: i8) -> Date {
    date(2025, 6, rng.gen_range(from..=30))
}

fn assert_dense(tasks: &[Task]) {
    let partitioned = Partitioned::from_tasks(tasks.to_vec());
    for partition in [&partitioned.pinned, &partitioned.unpinned] {
        let mut indices: Vec<i64> = partition.iter().map(|task| task.sort_index).collect();
        indices.sort_unstable();
        let expected: Vec<i64> = (0..partition.len() as i64).collect();
        assert_eq!(indices, expected);
    }
}

fn seed_tasks(svc: &mut TestService<'_>, count: usize) -> Vec<Task> {
    (0..count)
        .map(|n| svc.create(&format!("Task {n}"), "", today(), None).unwrap())
        .collect()
}

#[test]
fn gated_priority_assignment_keeps_one_holder_per_symbol() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let conn = open_db_in_memory().unwrap();
        let mut svc = service(&conn, ManualClock::new(now()));
        let mut tasks = seed_tasks(&mut svc, 6);

        for _ in 0..40 {
            let slot = rng.gen_range(0..tasks.len());
            let menu = svc.available_priority_symbols(&tasks[slot]).unwrap();
            let symbol = if menu.can_clear && rng.gen_bool(0.3) {
                PrioritySymbol::None
            } else if menu.symbols.is_empty() {
                continue;
            } else {
                menu.symbols[rng.gen_range(0..menu.symbols.len())]
            };
            svc.set_priority(&mut tasks[slot], symbol).unwrap();

            let stored = svc.fetch_all().unwrap();
            for pinned in PrioritySymbol::PINNED {
                let holders = stored.iter().filter(|task| task.priority == pinned).count();
                assert!(holders <= 1, "seed {seed}: {pinned} held {holders} times");
            }
        }
    }
}

#[test]
fn stored_rank_always_matches_symbol() {
    let mut rng = StdRng::seed_from_u64(11);
    let conn = open_db_in_memory().unwrap();
    let mut svc = service(&conn, ManualClock::new(now()));
    let mut tasks = seed_tasks(&mut svc, 5);

    for _ in 0..30 {
        let slot = rng.gen_range(0..tasks.len());
        let menu = svc.available_priority_symbols(&tasks[slot]).unwrap();
        let mut choices = menu.symbols.clone();
        choices.push(PrioritySymbol::None);
        let symbol = choices[rng.gen_range(0..choices.len())];
        svc.set_priority(&mut tasks[slot], symbol).unwrap();
        assert_eq!(tasks[slot].priority_rank(), symbol.rank());

        let mut stmt = conn
            .prepare("SELECT priority_symbol, priority_rank FROM tasks;")
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .unwrap();
        for row in rows {
            let (symbol, rank) = row.unwrap();
            let parsed: PrioritySymbol = symbol.parse().unwrap();
            assert_eq!(i64::from(parsed.rank()), rank);
        }
    }
}

#[test]
fn create_delete_move_postpone_keep_indices_dense() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let conn = open_db_in_memory().unwrap();
        let mut svc = service(&conn, ManualClock::new(now()));
        seed_tasks(&mut svc, 3);

        let tomorrow = today().tomorrow().unwrap();
        for step in 0..60 {
            let current = svc.fetch_for_day(today()).unwrap();
            match rng.gen_range(0..4) {
                0 => {
                    svc.create(&format!("Step {step}"), "", today(), None)
                        .unwrap();
                }
                1 if !current.is_empty() => {
                    let victim = &current[rng.gen_range(0..current.len())];
                    svc.delete(victim).unwrap();
                }
                2 if !current.is_empty() => {
                    let mut task = current[rng.gen_range(0..current.len())].clone();
                    let target = svc
                        .calendar()
                        .start_of_day(tomorrow)
                        .unwrap()
                        .checked_add(rng.gen_range(0i64..24).hours())
                        .unwrap();
                    svc.set_status(
                        &mut task,
                        StatusChange::Postpone {
                            target,
                            reason: String::new(),
                        },
                    )
                    .unwrap();
                }
                _ if !current.is_empty() => {
                    let len = current.len();
                    let sources: Vec<usize> = (0..rng.gen_range(1..=2))
                        .map(|_| rng.gen_range(0..len))
                        .collect();
                    let destination = rng.gen_range(0..=len);
                    svc.move_within_list(today(), &sources, destination)
                        .unwrap();
                }
                _ => {}
            }
            assert_dense(&svc.fetch_for_day(today()).unwrap());
            assert_dense(&svc.fetch_for_day(tomorrow).unwrap());
        }
    }
}

#[test]
fn pinned_tasks_precede_unpinned_in_today_list() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let conn = open_db_in_memory().unwrap();
        let mut svc = service(&conn, ManualClock::new(now()));
        let mut tasks = seed_tasks(&mut svc, 8);

        for symbol in PrioritySymbol::PINNED {
            let slot = rng.gen_range(0..tasks.len());
            if !tasks[slot].is_pinned() {
                svc.set_priority(&mut tasks[slot], symbol).unwrap();
            }
        }
        svc.move_within_list(today(), &[7], rng.gen_range(3..=8))
            .unwrap();

        let listed = svc.fetch_today().unwrap();
        let first_unpinned = listed
            .iter()
            .position(|task| !task.is_pinned())
            .unwrap_or(listed.len());
        assert!(listed[first_unpinned..].iter().all(|task| !task.is_pinned()));

        let combined = Partitioned::from_tasks(listed).combined();
        let first_unpinned = combined
            .iter()
            .position(|task| !task.is_pinned())
            .unwrap_or(combined.len());
        assert!(combined[first_unpinned..].iter().all(|task| !task.is_pinned()));
    }
}

#[test]
fn done_tasks_trail_unfinished_ones_in_today_list() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let conn = open_db_in_memory().unwrap();
        let mut svc = service(&conn, ManualClock::new(now()));
        let mut tasks = seed_tasks(&mut svc, 7);

        for task in tasks.iter_mut() {
            if rng.gen_bool(0.3) {
                let _ = svc.set_priority(task, PrioritySymbol::PINNED[rng.gen_range(0..3)]);
            }
            if rng.gen_bool(0.5) {
                svc.set_status(task, StatusChange::Complete).unwrap();
            } else if rng.gen_bool(0.5) {
                svc.set_status(task, StatusChange::Start).unwrap();
            }
        }

        let listed = svc.fetch_today().unwrap();
        let first_done = listed
            .iter()
            .position(|task| task.status == TaskStatus::Done)
            .unwrap_or(listed.len());
        assert!(listed[first_done..].iter().all(|task| task.is_done()));
    }
}

#[test]
fn postponement_always_lands_on_a_later_day() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..40 {
        let call_time = now()
            .checked_add(rng.gen_range(-600i64..600).minutes())
            .unwrap();
        let conn = open_db_in_memory().unwrap();
        let clock = ManualClock::new(call_time);
        let mut svc = service(&conn, clock);
        let mut task = svc.create("Task", "", today(), None).unwrap();

        let target: Timestamp = call_time
            .checked_add(rng.gen_range(-5_000i64..5_000).minutes())
            .unwrap();
        svc.set_status(
            &mut task,
            StatusChange::Postpone {
                target,
                reason: String::new(),
            },
        )
        .unwrap();

        let call_day = svc.calendar().day_of(call_time);
        let start_of_next = svc
            .calendar()
            .start_of_day(call_day.tomorrow().unwrap())
            .unwrap();
        let landed = task.postpone_date.unwrap();
        assert!(landed >= start_of_next, "target {target} landed at {landed}");
        assert_eq!(task.start_time, Some(landed));
    }
}

#[test]
fn incremental_buckets_match_full_rebuild() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let conn = open_db_in_memory().unwrap();
        let mut svc = service(&conn, ManualClock::new(now()));
        svc.load_month(today()).unwrap();
        let mut live: Vec<Task> = Vec::new();

        for step in 0..50 {
            match rng.gen_range(0..3) {
                0 => {
                    let day = june_day(&mut rng, 1);
                    live.push(svc.create(&format!("Step {step}"), "", day, None).unwrap());
                }
                1 if !live.is_empty() => {
                    let slot = rng.gen_range(0..live.len());
                    let day = june_day(&mut rng, 10);
                    svc.reschedule(&mut live[slot], day).unwrap();
                }
                2 if !live.is_empty() => {
                    let victim = live.swap_remove(rng.gen_range(0..live.len()));
                    svc.delete(&victim).unwrap();
                }
                _ => {}
            }
        }

        let incremental = svc.day_buckets().clone();
        svc.load_month(today()).unwrap();
        assert_eq!(&incremental, svc.day_buckets(), "seed {seed}");
        for day in svc.month_days() {
            assert_eq!(incremental.count_for(day), svc.count_for(day));
        }
    }
}
