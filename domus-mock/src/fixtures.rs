use domus_core::{PhotoAsset, PropertyCard};

#[allow(clippy::too_many_arguments)]
fn card(
    id: &str,
    address: &str,
    city: &str,
    state: &str,
    zip: &str,
    kind: &str,
    price: u64,
    beds: u32,
    baths: u32,
    sqft: u32,
    images: &[&str],
) -> PropertyCard {
    PropertyCard {
        id: id.to_string(),
        listing_id: id.to_string(),
        property_id: format!("P{id}"),
        address: address.to_string(),
        city: city.to_string(),
        state: state.to_string(),
        zip: zip.to_string(),
        kind: kind.to_string(),
        price,
        beds,
        baths,
        sqft,
        year_built: 0,
        images: images.iter().map(|s| (*s).to_string()).collect(),
        coords: [-89.65, 39.78],
        mls: String::new(),
        source: "mock".to_string(),
    }
}

/// Fixture listings for a postal code, in provider order.
pub fn listings(zip: &str) -> Vec<PropertyCard> {
    match zip {
        "62704" => vec![
            card(
                "L-100",
                "120 Main St",
                "Springfield",
                "IL",
                "62704",
                "single_family",
                189_000,
                3,
                2,
                1_450,
                &["https://img.example/100-a.jpg"],
            ),
            card(
                "L-101",
                "123 Main Street",
                "Springfield",
                "IL",
                "62704",
                "single_family",
                215_000,
                3,
                2,
                1_720,
                &["https://img.example/101-a.jpg", "https://img.example/101-b.jpg"],
            ),
            card(
                "L-102",
                "9 Lincoln Avenue",
                "Springfield",
                "Illinois",
                "62704",
                "condos",
                129_500,
                2,
                1,
                980,
                &[],
            ),
        ],
        "78701" => (0..7)
            .map(|i| {
                card(
                    &format!("L-2{i:02}"),
                    &format!("{} Congress Ave", 100 + i),
                    "Austin",
                    "TX",
                    "78701",
                    "condos",
                    400_000 + u64::from(i) * 10_000,
                    1 + i % 3,
                    1 + i % 2,
                    700 + i * 50,
                    &[],
                )
            })
            .collect(),
        "10001" => vec![card(
            "L-300",
            "",
            "New York",
            "NY",
            "10001",
            "condos",
            999_000,
            1,
            1,
            600,
            &[],
        )],
        _ => Vec::new(),
    }
}

/// Fixture photo set for a provider property id.
pub fn photos(property_id: &str) -> Vec<PhotoAsset> {
    if property_id.is_empty() {
        return Vec::new();
    }
    (0..2)
        .map(|i| PhotoAsset {
            href: format!("https://img.example/{property_id}-{i}-w2048_h1536.jpg"),
            description: String::new(),
            title: format!("photo {i}"),
            kind: "exterior".to_string(),
            media_type: String::new(),
            tags: vec!["house_view".to_string(), "house_view".to_string(), "yard".to_string()],
            position: i,
        })
        .collect()
}
