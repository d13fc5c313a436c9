/// Starter questions offered before the first send
pub const SUGGESTIONS: [&str; 5] = [
    "Comment obtenir un titre foncier au Bénin ?",
    "Quels sont les documents nécessaires pour acheter un terrain ?",
    "Quelle est la procédure d'immatriculation ?",
    "Comment vérifier la régularité d'un terrain ?",
    "Quels sont les services de l'ANDF ?",
];

pub fn all() -> &'static [&'static str] {
    &SUGGESTIONS
}
