//! Built-in car catalog.

use serde::{Deserialize, Serialize};

/// Static description of a drivable car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSpec {
    pub id:    String,
    pub name:  String,
    /// Coins needed to unlock; zero for the starter car.
    pub price: u64,
    /// Multiplies the base top speed.
    pub speed_multiplier: f32,
    /// Multiplies the lateral steering rate.
    pub handling: f32,
    /// Body colour, 0xAARRGGBB.
    pub color: u32,
}

impl CarSpec {
    fn new(id: &str, name: &str, price: u64, speed_multiplier: f32, handling: f32, color: u32) -> Self {
        CarSpec { id: id.to_string(), name: name.to_string(), price, speed_multiplier, handling, color }
    }
}

/// Every car the game knows about, cheapest first.  The first entry is free.
pub fn catalog() -> Vec<CarSpec> {
    vec![
        CarSpec::new("hatch",  "Hatchback", 0,    1.00, 1.00, 0xFF3FA7D6),
        CarSpec::new("coupe",  "Coupe",     150,  1.10, 1.05, 0xFFF2C14E),
        CarSpec::new("muscle", "Muscle",    400,  1.25, 0.85, 0xFFD1495B),
        CarSpec::new("rally",  "Rally",     700,  1.15, 1.30, 0xFF66C17A),
        CarSpec::new("proto",  "Prototype", 1200, 1.40, 1.20, 0xFFB084F5),
    ]
}

/// Look a car up by id.
pub fn find(id: &str) -> Option<CarSpec> {
    catalog().into_iter().find(|c| c.id == id)
}

/// The free starter car.
pub fn starter() -> CarSpec {
    CarSpec::new("hatch", "Hatchback", 0, 1.00, 1.00, 0xFF3FA7D6)
}
