//! Static expansion dictionary for query tokens (§4.5 step 1): materials,
//! categories and a handful of synonyms/abbreviations a player would
//! actually type. Deliberately small and hand-curated rather than
//! generated — it only needs to cover common Minecraft vocabulary.

/// Returns the expansion set for a single lowercase token, or an empty
/// slice if the token has no known expansion.
pub fn expand_token(token: &str) -> &'static [&'static str] {
    match token {
        "diamond" => &[
            "diamond pickaxe",
            "diamond sword",
            "diamond axe",
            "diamond shovel",
            "diamond hoe",
            "diamond helmet",
            "diamond chestplate",
            "diamond leggings",
            "diamond boots",
            "diamond ore",
            "deepslate diamond ore",
            "diamond block",
        ],
        "iron" => &[
            "iron pickaxe",
            "iron sword",
            "iron axe",
            "iron shovel",
            "iron hoe",
            "iron helmet",
            "iron chestplate",
            "iron leggings",
            "iron boots",
            "iron ore",
            "deepslate iron ore",
            "iron ingot",
            "iron block",
        ],
        "gold" | "golden" => &[
            "golden pickaxe",
            "golden sword",
            "golden axe",
            "golden shovel",
            "golden hoe",
            "golden helmet",
            "golden chestplate",
            "golden leggings",
            "golden boots",
            "gold ore",
            "deepslate gold ore",
            "gold ingot",
            "gold block",
            "gold nugget",
        ],
        "netherite" => &[
            "netherite pickaxe",
            "netherite sword",
            "netherite axe",
            "netherite shovel",
            "netherite hoe",
            "netherite helmet",
            "netherite chestplate",
            "netherite leggings",
            "netherite boots",
            "netherite ingot",
            "netherite scrap",
            "ancient debris",
        ],
        "wood" | "wooden" => &[
            "wooden pickaxe",
            "wooden sword",
            "wooden axe",
            "wooden shovel",
            "wooden hoe",
            "oak log",
            "oak planks",
        ],
        "tools" | "tool" => &[
            "pickaxe",
            "axe",
            "shovel",
            "hoe",
            "shears",
            "fishing rod",
        ],
        "weapons" | "weapon" => &["sword", "bow", "crossbow", "trident", "axe"],
        "armor" | "armour" => &["helmet", "chestplate", "leggings", "boots", "shield"],
        "food" => &[
            "bread",
            "cooked beef",
            "cooked porkchop",
            "cooked chicken",
            "apple",
            "golden apple",
            "carrot",
            "potato",
            "baked potato",
        ],
        "ore" | "ores" => &[
            "coal ore",
            "iron ore",
            "gold ore",
            "diamond ore",
            "emerald ore",
            "redstone ore",
            "lapis ore",
            "copper ore",
        ],
        "pick" => &["pickaxe"],
        "sword" | "swords" => &["sword"],
        "potion" | "potions" => &["potion", "splash potion", "lingering potion"],
        "enchanted" | "enchant" => &["enchanted book", "enchanting table"],
        "ingot" | "ingots" => &["iron ingot", "gold ingot", "netherite ingot", "copper ingot"],
        "block" | "blocks" => &["iron block", "gold block", "diamond block", "emerald block"],
        _ => &[],
    }
}

/// Tokenizes a raw query string to lowercase whitespace-separated tokens,
/// stripping a trailing "s" for naive plural handling before expansion
/// lookup (the lookup table itself stores singular keys).
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn singularize(token: &str) -> String {
    if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

/// Expands a raw query into the original tokens plus the union of their
/// expansions, preserving order and deduplicating (§4.5 step 1).
pub fn expand_query(query: &str) -> Vec<String> {
    let tokens = tokenize(query);
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for token in &tokens {
        if seen.insert(token.clone()) {
            out.push(token.clone());
        }
    }

    for token in &tokens {
        let singular = singularize(token);
        for candidate in [token.as_str(), singular.as_str()] {
            for expansion in expand_token(candidate) {
                if seen.insert(expansion.to_string()) {
                    out.push(expansion.to_string());
                }
            }
        }
    }

    out
}
