use super::Event;

/// Colours offered by the event creation screen.
pub const PALETTE: &[&str] = &[
    "#1E3A8A", "#8E24AA", "#D81B60", "#E53935", "#F4511E", "#FF8F00", "#2E7D32", "#00695C",
    "#00897B", "#0277BD", "#3949AB", "#512DA8", "#6D4C41", "#BF360C", "#4A148C", "#1B5E20",
    "#006064", "#B71C1C", "#AD1457", "#C2185B", "#7B1FA2", "#33691E", "#01579B", "#004D40",
    "#880E4F", "#F57C00", "#558B2F", "#311B92", "#D32F2F", "#00ACC1", "#283593", "#689F38",
    "#E64A19", "#5E35B1", "#00838F", "#6A1B9A", "#FF6F00", "#1A237E", "#C62828", "#FF3D00",
    "#FFEA00", "#00E5FF", "#76FF03", "#F50057", "#651FFF", "#E040FB", "#BBDEFB", "#C8E6C9",
    "#FFF9C4", "#FFCCBC", "#F8BBD0", "#D1C4E9", "#B2EBF2", "#757575", "#424242", "#BCAAA4",
    "#A1887F",
];

/// Collection used on first run and when the stored blob can't be decoded.
pub fn seed_events() -> Vec<Event> {
    [
        ("1", "Did a good deed", "#1E3A8A", "🌈"),
        ("2", "Went for a medical check-up", "#0277BD", "🚑"),
        ("3", "Experienced stress", "#B71C1C", "🫩"),
    ]
    .into_iter()
    .map(|(id, name, color, icon)| Event {
        id: id.into(),
        name: name.into(),
        color: color.into(),
        icon: icon.into(),
        comment: String::new(),
        favorite: false,
        data: Vec::new(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::is_hex_color;

    #[test]
    fn seed_has_three_empty_events() {
        let seed = seed_events();
        let ids: Vec<&str> = seed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(seed.iter().all(|e| e.data.is_empty() && !e.favorite));
        assert_eq!(seed[1].name, "Went for a medical check-up");
    }

    #[test]
    fn palette_entries_are_hex_and_seed_uses_them() {
        assert!(PALETTE.iter().all(|c| is_hex_color(c)));
        for event in seed_events() {
            assert!(PALETTE.contains(&event.color.as_str()));
        }
    }
}
