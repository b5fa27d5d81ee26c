use crate::staging::{ImageId, ListChange, Preview, StagingList};
use std::time::{Duration, Instant};

/// Render-side copy of one staged image. Outlives the list entry while its
/// removal fades out.
#[derive(Debug, Clone)]
pub struct Card {
    pub id: ImageId,
    pub name: String,
    pub size: u64,
    pub preview: Option<Preview>,
    pub fading_since: Option<Instant>,
}

impl Card {
    pub fn texture_uri(&self) -> String {
        texture_uri(self.id)
    }
}

/// Key egui caches the decoded preview under.
pub fn texture_uri(id: ImageId) -> String {
    format!("bytes://staged/{}", id)
}

/// Follows a [`StagingList`] through its change events.
pub struct CardBoard {
    cards: Vec<Card>,
    fade: Duration,
    released: Vec<ImageId>,
}

impl CardBoard {
    pub fn new(fade: Duration) -> Self {
        Self {
            cards: Vec::new(),
            fade,
            released: Vec::new(),
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn sync(&mut self, list: &mut StagingList, now: Instant) {
        for change in list.drain_changes() {
            match change {
                ListChange::Added(id) => {
                    if let Some(image) = list.get(id) {
                        self.cards.push(Card {
                            id,
                            name: image.name.clone(),
                            size: image.size,
                            preview: image.preview.clone(),
                            fading_since: None,
                        });
                    }
                }
                ListChange::PreviewReady(id) => {
                    let preview = list.get(id).and_then(|img| img.preview.clone());
                    if let Some(card) = self.cards.iter_mut().find(|c| c.id == id) {
                        card.preview = preview;
                    }
                }
                ListChange::Removed(id) => {
                    if let Some(card) = self.cards.iter_mut().find(|c| c.id == id) {
                        card.fading_since.get_or_insert(now);
                    }
                }
                ListChange::Cleared => {
                    self.released.extend(self.cards.drain(..).map(|c| c.id));
                }
            }
        }
    }

    /// Drops cards whose fade finished. Returns true while something is
    /// still fading.
    pub fn tick(&mut self, now: Instant) -> bool {
        let fade = self.fade;
        let mut still_fading = false;
        let released = &mut self.released;

        self.cards.retain(|card| match card.fading_since {
            Some(since) if now.duration_since(since) >= fade => {
                released.push(card.id);
                false
            }
            Some(_) => {
                still_fading = true;
                true
            }
            None => true,
        });
        still_fading
    }

    /// 1.0 for live cards, falling to 0.0 over the fade.
    pub fn opacity(&self, card: &Card, now: Instant) -> f32 {
        match card.fading_since {
            None => 1.0,
            Some(_) if self.fade.is_zero() => 0.0,
            Some(since) => {
                let elapsed = now.duration_since(since).as_secs_f32();
                (1.0 - elapsed / self.fade.as_secs_f32()).clamp(0.0, 1.0)
            }
        }
    }

    /// Cards that left the grid since the last call, so their textures can
    /// be freed.
    pub fn take_released(&mut self) -> Vec<ImageId> {
        std::mem::take(&mut self.released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::CandidateFile;

    fn list_with(names: &[&str]) -> (StagingList, Vec<ImageId>) {
        let mut list = StagingList::default();
        let report = list.add(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| CandidateFile::new(*n, i as u64 + 1, Some("image/png"))),
        );
        (list, report.accepted)
    }

    #[test]
    fn test_cards_follow_additions_and_previews() {
        let (mut list, ids) = list_with(&["a.png", "b.png"]);
        let mut board = CardBoard::new(Duration::from_millis(300));
        let now = Instant::now();

        board.sync(&mut list, now);
        assert_eq!(board.cards().len(), 2);
        assert!(board.cards()[0].preview.is_none());

        list.attach_preview(ids[0], Preview::new("image/png", vec![1u8]));
        board.sync(&mut list, now);
        assert!(board.cards()[0].preview.is_some());
    }

    #[test]
    fn test_removed_card_fades_then_leaves() {
        let (mut list, ids) = list_with(&["a.png", "b.png"]);
        let mut board = CardBoard::new(Duration::from_millis(300));
        let start = Instant::now();
        board.sync(&mut list, start);

        list.remove(ids[0]);
        board.sync(&mut list, start);

        // still drawn while fading, even though the list forgot it
        assert_eq!(list.len(), 1);
        assert_eq!(board.cards().len(), 2);
        assert!(board.tick(start + Duration::from_millis(100)));
        let fading = &board.cards()[0];
        let opacity = board.opacity(fading, start + Duration::from_millis(150));
        assert!(opacity > 0.4 && opacity < 0.6);

        assert!(!board.tick(start + Duration::from_millis(300)));
        assert_eq!(board.cards().len(), 1);
        assert_eq!(board.take_released(), vec![ids[0]]);
        assert!(board.take_released().is_empty());
    }

    #[test]
    fn test_clear_drops_everything_at_once() {
        let (mut list, ids) = list_with(&["a.png", "b.png"]);
        let mut board = CardBoard::new(Duration::from_millis(300));
        board.sync(&mut list, Instant::now());

        list.clear();
        board.sync(&mut list, Instant::now());

        assert!(board.cards().is_empty());
        assert_eq!(board.take_released(), ids);
    }
}
