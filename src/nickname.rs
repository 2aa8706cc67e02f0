use rand::Rng;

/// Render the nickname shown in every server: `🔵{dem}%/🔴{rep}%`.
///
/// The Democratic candidate always takes the first slot.
pub fn format_nickname(dem_pct: u8, rep_pct: u8) -> String {
    format!("🔵{}%/🔴{}%", dem_pct, rep_pct)
}

/// Two complementary percentages summing to exactly 100.
pub fn random_split<R: Rng>(rng: &mut R) -> (u8, u8) {
    let first: u8 = rng.random_range(0..=100);
    (first, 100 - first)
}
