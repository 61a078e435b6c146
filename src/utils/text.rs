use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Tipos de logradouro por extenso e a abreviação usada na base do ITBI.
/// O espaço final faz parte da chave: "travessa" sozinho não é abreviado.
const ADDRESS_ABBREVIATIONS: [(&str, &str); 6] = [
    ("rua ", "r "),
    ("avenida ", "av "),
    ("estrada ", "est "),
    ("travessa ", "tv "),
    ("praca ", "pca "),
    ("largo ", "lgo "),
];

/// Prepara o nome da rua digitado pelo usuário para a busca `ilike`.
///
/// Remove acentos (NFD + descarte das marcas combinantes), converte para
/// minúsculas, abrevia o tipo de logradouro apenas no início do texto (no
/// máximo uma substituição) e por fim remove espaços nas pontas.
pub fn normalize_street(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let folded: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let abbreviated = match ADDRESS_ABBREVIATIONS
        .iter()
        .find(|(full, _)| folded.starts_with(full))
    {
        Some((full, abbreviation)) => format!("{}{}", abbreviation, &folded[full.len()..]),
        None => folded,
    };

    abbreviated.trim().to_string()
}

/// Mantém apenas os dígitos (ex: CEP "01311-000" -> "01311000").
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
