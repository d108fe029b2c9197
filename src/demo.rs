// Demo contract pair: a reservation contract (V1) and the final deed (V2)

use crate::models::{Segment, SegmentationMode};
use crate::services::text_processor::build_segments;

pub const DEMO_V1: &str = "ARTICLE 3 - PRIX
Le prix de vente est fixé à 250.000 euros.
Ce prix est ferme et définitif.
Le dépôt de garantie est de 5%.

ARTICLE 4 - DÉLAI
La livraison est prévue au 1er trimestre 2024.
En cas de retard, une pénalité de 10€ par jour sera due.";

pub const DEMO_V2: &str = "ARTICLE 3 - PRIX DE VENTE
Le prix de vente est fixé à 255.000 euros.
Ce prix est ferme, définitif et non révisable.

ARTICLE 4 - DÉLAI DE LIVRAISON
La livraison est prévue au 2ème trimestre 2024.
Le dépôt de garantie est ramené à 2%.
(Clause ajoutée sur la force majeure excluant les pénalités)";

/// Segmented (V1, V2) demo pair.
pub fn demo_segments(mode: SegmentationMode) -> (Vec<Segment>, Vec<Segment>) {
    (build_segments(DEMO_V1, mode), build_segments(DEMO_V2, mode))
}
