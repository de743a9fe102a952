//! Moving selected items of a collection towards one end.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StackError;
use crate::item::StackItem;
use crate::watchstack::WatchStack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Top,
    Up,
    Down,
    Bottom,
}

impl FromStr for MoveDirection {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(MoveDirection::Top),
            "up" => Ok(MoveDirection::Up),
            "down" => Ok(MoveDirection::Down),
            "bottom" => Ok(MoveDirection::Bottom),
            other => Err(StackError::Json(serde::de::Error::custom(format!(
                "unknown move direction '{other}'"
            )))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAction<T> {
    pub direction: MoveDirection,
    pub items: Vec<T>,
}

/// An ordered collection that items can be moved in.
pub trait MoveTarget {
    type Item: PartialEq;

    /// Current order, index 0 first
    fn snapshot(&self) -> Vec<Self::Item>;

    fn move_item(&mut self, from: usize, to: usize);
}

impl<T: Clone + PartialEq> MoveTarget for Vec<T> {
    type Item = T;

    fn snapshot(&self) -> Vec<T> {
        self.clone()
    }

    fn move_item(&mut self, from: usize, to: usize) {
        let item = self.remove(from);
        self.insert(to, item);
    }
}

/// Index 0 is the top of the stack.
impl MoveTarget for WatchStack {
    type Item = StackItem;

    fn snapshot(&self) -> Vec<StackItem> {
        self.to_vec()
    }

    fn move_item(&mut self, from: usize, to: usize) {
        if let Some(item) = self.remove(from) {
            self.add(item, to);
        }
    }
}

/// Move `action.items` in `coll`. Selected items already packed at the
/// target end stay where they are; relative order is kept.
pub fn move_items<C: MoveTarget + ?Sized>(coll: &mut C, action: &MoveAction<C::Item>) {
    let to_move = &action.items;
    if to_move.is_empty() {
        return;
    }

    match action.direction {
        MoveDirection::Top => move_top(coll, to_move),
        MoveDirection::Up => move_up(coll, to_move),
        MoveDirection::Down => move_down(coll, to_move),
        MoveDirection::Bottom => move_bottom(coll, to_move),
    }
}

fn move_top<C: MoveTarget + ?Sized>(coll: &mut C, to_move: &[C::Item]) {
    let mut items = coll.snapshot();
    let mut moved = 0;
    let mut i = items.len();

    while i > 0 {
        if to_move.contains(&items[i - 1]) {
            coll.move_item(i - 1, 0);
            moved += 1;
            if moved == to_move.len() {
                break;
            }
            // the item above slid into this position
            items = coll.snapshot();
            continue;
        }
        i -= 1;
    }
}

fn move_up<C: MoveTarget + ?Sized>(coll: &mut C, to_move: &[C::Item]) {
    let mut items = coll.snapshot();
    let mut moved = 0;

    for i in 0..items.len() {
        if to_move.contains(&items[i]) {
            if i != moved {
                coll.move_item(i, i - 1);
            }
            moved += 1;
            if moved == to_move.len() {
                break;
            }
            items = coll.snapshot();
        }
    }
}

fn move_down<C: MoveTarget + ?Sized>(coll: &mut C, to_move: &[C::Item]) {
    let mut items = coll.snapshot();
    let len = items.len();
    let mut moved = 0;

    for i in (0..len).rev() {
        if to_move.contains(&items[i]) {
            if len - 1 - i != moved {
                coll.move_item(i, i + 1);
            }
            moved += 1;
            if moved == to_move.len() {
                break;
            }
            items = coll.snapshot();
        }
    }
}

fn move_bottom<C: MoveTarget + ?Sized>(coll: &mut C, to_move: &[C::Item]) {
    let mut items = coll.snapshot();
    let last = match items.len() {
        0 => return,
        n => n - 1,
    };
    let mut moved = 0;
    let mut i = 0;

    while i < items.len() {
        if to_move.contains(&items[i]) {
            coll.move_item(i, last);
            moved += 1;
            if moved == to_move.len() {
                break;
            }
            // the item below slid into this position
            items = coll.snapshot();
            continue;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::VideoInfo;
    use proptest::prelude::*;

    fn apply(direction: MoveDirection, picks: &[i32]) -> Vec<i32> {
        let mut arr: Vec<i32> = (1..=8).collect();
        move_items(
            &mut arr,
            &MoveAction {
                direction,
                items: picks.to_vec(),
            },
        );
        arr
    }

    #[test]
    fn test_top() {
        assert_eq!(apply(MoveDirection::Top, &[3]), vec![3, 1, 2, 4, 5, 6, 7, 8]);
        assert_eq!(apply(MoveDirection::Top, &[1]), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(apply(MoveDirection::Top, &[5, 8, 1]), vec![1, 5, 8, 2, 3, 4, 6, 7]);
        assert_eq!(apply(MoveDirection::Top, &[1, 3, 2]), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_up() {
        assert_eq!(apply(MoveDirection::Up, &[3]), vec![1, 3, 2, 4, 5, 6, 7, 8]);
        assert_eq!(apply(MoveDirection::Up, &[1]), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(apply(MoveDirection::Up, &[5, 6, 1, 8]), vec![1, 2, 3, 5, 6, 4, 8, 7]);

        let mut arr = vec!['a', 'b', 'c', 'd'];
        move_items(
            &mut arr,
            &MoveAction {
                direction: MoveDirection::Up,
                items: vec!['a', 'c'],
            },
        );
        assert_eq!(arr, vec!['a', 'c', 'b', 'd']);
    }

    #[test]
    fn test_down() {
        assert_eq!(apply(MoveDirection::Down, &[3]), vec![1, 2, 4, 3, 5, 6, 7, 8]);
        assert_eq!(apply(MoveDirection::Down, &[8]), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(apply(MoveDirection::Down, &[1, 4, 8, 7]), vec![2, 1, 3, 5, 4, 6, 7, 8]);
    }

    #[test]
    fn test_bottom() {
        assert_eq!(apply(MoveDirection::Bottom, &[3]), vec![1, 2, 4, 5, 6, 7, 8, 3]);
        assert_eq!(apply(MoveDirection::Bottom, &[8]), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(apply(MoveDirection::Bottom, &[2, 5, 8]), vec![1, 3, 4, 6, 7, 2, 5, 8]);
    }

    #[test]
    fn test_stack_moves_in_top_first_order() {
        let mut stack = WatchStack::new("s", "s");
        for id in ["1", "2", "3", "4"] {
            stack.push(StackItem::from(VideoInfo::new(id)));
        }
        // top first: 4 3 2 1
        let two = stack.peek(2).unwrap().clone();

        move_items(
            &mut stack,
            &MoveAction {
                direction: MoveDirection::Top,
                items: vec![two],
            },
        );

        let ids: Vec<String> = stack.to_vec().iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["2", "4", "3", "1"]);
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("bottom".parse::<MoveDirection>().unwrap(), MoveDirection::Bottom);
        assert!("sideways".parse::<MoveDirection>().is_err());
    }

    proptest! {
        #[test]
        fn prop_moves_keep_the_elements(
            picks in proptest::collection::btree_set(1i32..=8, 0..8),
            dir in 0u8..4,
        ) {
            let direction = [
                MoveDirection::Top,
                MoveDirection::Up,
                MoveDirection::Down,
                MoveDirection::Bottom,
            ][dir as usize];
            let picks: Vec<i32> = picks.into_iter().collect();

            let mut moved = apply(direction, &picks);
            moved.sort_unstable();
            prop_assert_eq!(moved, (1..=8).collect::<Vec<_>>());
        }

        #[test]
        fn prop_top_packs_selection_in_order(picks in proptest::collection::btree_set(1i32..=8, 1..8)) {
            let picks: Vec<i32> = picks.into_iter().collect();
            let moved = apply(MoveDirection::Top, &picks);
            prop_assert_eq!(&moved[..picks.len()], &picks[..]);
        }
    }
}
