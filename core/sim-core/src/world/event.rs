use super::case::{AlertStatus, CaseId, VirusStatus};

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BinaryHeap};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub time: u32,
    pub from: CaseId,
    pub to: CaseId,
    pub weight: f64,
    pub label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfectionEvent {
    pub time: u32,
    pub id: CaseId,
    pub next: VirusStatus,
    pub exposed_by: Option<CaseId>,
    pub exposed_time: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirusEvent {
    pub time: u32,
    pub id: CaseId,
    pub old: VirusStatus,
    pub next: VirusStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub time: u32,
    pub id: CaseId,
    pub old: AlertStatus,
    pub next: AlertStatus,
}

/// Everything the simulation loop schedules and processes. Events are plain
/// value records; the loop dispatches on the tag and owns all mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Contact(ContactEvent),
    Infection(InfectionEvent),
    Virus(VirusEvent),
    Alert(AlertEvent),
}

impl Event {
    pub fn time(&self) -> u32 {
        match self {
            Event::Contact(e) => e.time,
            Event::Infection(e) => e.time,
            Event::Virus(e) => e.time,
            Event::Alert(e) => e.time,
        }
    }

    /// Same-timestamp tie-break: status changes land before contacts so a
    /// contact evaluated at a tick sees that tick's statuses.
    fn rank(&self) -> u8 {
        match self {
            Event::Infection(_) => 0,
            Event::Virus(_) => 1,
            Event::Alert(_) => 2,
            Event::Contact(_) => 3,
        }
    }
}

struct Scheduled {
    event: Event,
    seq: u64,
}

impl Scheduled {
    fn key(&self) -> (u32, u8, u64) {
        (self.event.time(), self.event.rank(), self.seq)
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Inverted so the max-heap pops the smallest key first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Time-ordered pending events. Pop order is total and reproducible:
/// (time, kind rank, insertion sequence).
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Scheduled>,
    seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Scheduled { event, seq });
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        for e in events {
            self.push(e);
        }
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|s| s.event)
    }

    pub fn peek_time(&self) -> Option<u32> {
        self.heap.peek().map(|s| s.event.time())
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Append-only history of processed contacts, the substrate contact tracing
/// queries. Contacts are appended in processing order, so the vector stays
/// ascending in `time`.
#[derive(Default)]
pub struct CompletedContacts(Vec<ContactEvent>);

impl CompletedContacts {
    pub fn record(&mut self, contact: ContactEvent) {
        self.0.push(contact);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Counterparts of `id` over contacts in the closed window
    /// `[start, end]`.
    pub fn contacts_of(&self, id: CaseId, start: u32, end: u32) -> Vec<CaseId> {
        self.0
            .iter()
            .filter(|c| c.time >= start && c.time <= end)
            .filter_map(|c| {
                if c.from == id {
                    Some(c.to)
                } else if c.to == id {
                    Some(c.from)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(time: u32, from: u32, to: u32) -> Event {
        Event::Contact(ContactEvent {
            time,
            from: CaseId(from),
            to: CaseId(to),
            weight: 1.0,
            label: String::new(),
        })
    }

    fn virus(time: u32, id: u32) -> Event {
        Event::Virus(VirusEvent {
            time,
            id: CaseId(id),
            old: VirusStatus::Exposed,
            next: VirusStatus::Asymptomatic,
        })
    }

    fn alert(time: u32, id: u32) -> Event {
        Event::Alert(AlertEvent {
            time,
            id: CaseId(id),
            old: AlertStatus::None,
            next: AlertStatus::Alerted,
        })
    }

    #[test]
    fn pops_in_time_order() {
        let mut q = EventQueue::new();
        q.push(contact(5, 1, 2));
        q.push(contact(1, 3, 4));
        q.push(contact(3, 5, 6));
        let times: Vec<u32> = std::iter::from_fn(|| q.pop()).map(|e| e.time()).collect();
        assert_eq!(times, vec![1, 3, 5]);
    }

    #[test]
    fn same_time_pops_in_kind_rank_order() {
        let mut q = EventQueue::new();
        q.push(contact(2, 1, 2));
        q.push(alert(2, 1));
        q.push(virus(2, 1));
        q.push(Event::Infection(InfectionEvent {
            time: 2,
            id: CaseId(9),
            next: VirusStatus::Exposed,
            exposed_by: None,
            exposed_time: 2,
        }));

        assert!(matches!(q.pop(), Some(Event::Infection(_))));
        assert!(matches!(q.pop(), Some(Event::Virus(_))));
        assert!(matches!(q.pop(), Some(Event::Alert(_))));
        assert!(matches!(q.pop(), Some(Event::Contact(_))));
    }

    #[test]
    fn same_time_same_kind_pops_in_insertion_order() {
        let mut q = EventQueue::new();
        q.push(contact(1, 10, 11));
        q.push(contact(1, 20, 21));
        q.push(contact(1, 30, 31));
        let froms: Vec<u32> = std::iter::from_fn(|| q.pop())
            .map(|e| match e {
                Event::Contact(c) => c.from.0,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(froms, vec![10, 20, 30]);
    }

    #[test]
    fn completed_log_window_is_closed_on_both_ends() {
        let mut log = CompletedContacts::default();
        for (t, a, b) in [(0, 1, 2), (1, 1, 3), (2, 4, 1), (3, 1, 5)] {
            log.record(ContactEvent {
                time: t,
                from: CaseId(a),
                to: CaseId(b),
                weight: 1.0,
                label: String::new(),
            });
        }
        let found = log.contacts_of(CaseId(1), 1, 2);
        assert_eq!(found, vec![CaseId(3), CaseId(4)]);
    }
}
