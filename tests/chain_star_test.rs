use relativity::{BiMultiMap, Chain, RelationEvent, RelationListener, Star};
use std::cell::Cell;
use std::rc::Rc;

fn enrollment() -> BiMultiMap<&'static str, &'static str> {
    BiMultiMap::from_pairs([
        ("alice", "math"),
        ("alice", "english"),
        ("bob", "english"),
        ("carol", "art"),
    ])
}

#[test]
fn test_only_restricts_student_class_student() {
    let takes = enrollment();
    let chain = Chain::new(vec![takes.clone(), takes.inverse()]);
    let mine = chain.only(&"alice");

    assert_eq!(mine.len(), chain.len());
    let first = &mine.m2ms()[0];
    assert_eq!(first.keys(), vec!["alice"]);
    assert_eq!(first.get(&"alice").to_vec(), vec!["math", "english"]);
    assert_eq!(mine.m2ms()[1].keys(), vec!["math", "english"]);
    assert_eq!(mine.m2ms()[1].get(&"english").to_vec(), vec!["alice", "bob"]);

    let classmates: Vec<_> = mine.rows().map(|row| row[2]).collect();
    assert_eq!(classmates, vec!["alice", "alice", "bob"]);

    // originals untouched, fresh maps
    assert_eq!(takes.pair_count(), 4);
    mine.m2ms()[0].add("alice", "art");
    assert!(!takes.contains(&"alice", &"art"));
}

#[test]
fn test_rows_do_not_dedup_threads() {
    let a = BiMultiMap::from_pairs([(1u32, 10u32), (1, 11)]);
    let b = BiMultiMap::from_pairs([(10u32, 100u32), (11, 100)]);
    let rows: Vec<_> = Chain::new(vec![a, b]).rows().collect();
    assert_eq!(rows, vec![vec![1, 10, 100], vec![1, 11, 100]]);
}

#[test]
fn test_mismatched_chain_is_empty() {
    let a = BiMultiMap::from_pairs([(1u32, 2u32)]);
    let b = BiMultiMap::from_pairs([(3u32, 4u32)]);
    assert_eq!(Chain::new(vec![a, b]).rows().count(), 0);
}

#[test]
fn test_m2ms_positions_can_be_replaced() {
    let a = BiMultiMap::from_pairs([(1u32, 2u32)]);
    let b = BiMultiMap::from_pairs([(2u32, 3u32)]);
    let mut chain = Chain::new(vec![a, b]);
    chain.m2ms_mut()[1] = BiMultiMap::from_pairs([(2, 9)]);
    assert_eq!(chain.rows().collect::<Vec<_>>(), vec![vec![1, 2, 9]]);
}

#[test]
fn test_chain_add_is_one_event() {
    struct Counter(Cell<usize>);
    impl RelationListener<u32, u32> for Counter {
        fn on_event(&self, _event: &RelationEvent<u32, u32>) {
            self.0.set(self.0.get() + 1);
        }
    }

    let a: BiMultiMap<u32, u32> = BiMultiMap::new();
    let b: BiMultiMap<u32, u32> = BiMultiMap::new();
    let counter = Rc::new(Counter(Cell::new(0)));
    let id = a.subscribe(&counter);
    b.subscribe_with_id(id, &counter);

    let chain = Chain::new(vec![a.clone(), b.clone()]);
    chain.add(&[1, 2, 3]).unwrap();
    assert_eq!(counter.0.get(), 1);
    assert!(a.contains(&1, &2) && b.contains(&2, &3));

    chain.add(&[1, 2, 3]).unwrap();
    assert_eq!(counter.0.get(), 1, "no effective change, no event");
}

#[test]
fn test_star_rows_follow_first_seen_order() {
    let email = BiMultiMap::from_pairs([("bob", "b@x"), ("alice", "a@x")]);
    let phone = BiMultiMap::from_pairs([("carol", "555"), ("alice", "123")]);
    let star = Star::new(vec![email, phone]);

    let keys: Vec<_> = star.rows().map(|row| row.key).collect();
    assert_eq!(keys, vec!["bob", "alice", "carol"]);

    let carol = star.get(&"carol");
    assert!(carol[0].is_empty());
    assert_eq!(carol[1].iter().copied().collect::<Vec<_>>(), vec!["555"]);
    assert_eq!(star.combinations(&"alice"), vec![vec!["a@x", "123"]]);
}
