use crate::models::transaction::{
    SearchFilter, COLUMN_NUMBER, COLUMN_POSTAL_CODE, COLUMN_STREET, COLUMN_YEAR, RESULT_CAP,
    TRANSACTIONS_TABLE,
};
use crate::utils::{digits_only, normalize_street};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredicateValue {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredicateValue::Int(v) => write!(f, "{}", v),
            PredicateValue::Text(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `coluna IN (...)`
    In { column: &'static str, values: Vec<i64> },
    /// `coluna = valor`
    Eq { column: &'static str, value: PredicateValue },
    /// `coluna ILIKE '%fragmento%'`
    ILike { column: &'static str, fragment: String },
}

impl Predicate {
    pub fn column(&self) -> &'static str {
        match self {
            Predicate::In { column, .. }
            | Predicate::Eq { column, .. }
            | Predicate::ILike { column, .. } => *column,
        }
    }

    /// Valor no formato de filtro do PostgREST (`in.(..)`, `eq.x`, `ilike.%x%`)
    fn to_postgrest(&self) -> String {
        match self {
            Predicate::In { values, .. } => {
                let list = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
                format!("in.({})", list)
            }
            Predicate::Eq { value, .. } => format!("eq.{}", value),
            Predicate::ILike { fragment, .. } => format!("ilike.%{}%", fragment),
        }
    }
}

/// Leitura limitada e imutável na tabela de transações.
///
/// Montada uma vez a partir do `SearchFilter` e avaliada uma vez; todos os
/// predicados são combinados com AND. Também serve de chave do cache de buscas.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionQuery {
    pub table: &'static str,
    pub predicates: Vec<Predicate>,
    pub limit: usize,
}

impl TransactionQuery {
    pub fn from_filter(filter: &SearchFilter) -> Self {
        let mut predicates = Vec::new();

        if !filter.years.is_empty() {
            predicates.push(Predicate::In {
                column: COLUMN_YEAR,
                values: filter.years.iter().map(|y| i64::from(*y)).collect(),
            });
        }

        // TODO: confirmar com o dono da base se `cep` é inteiro ou texto com zeros à esquerda;
        // hoje "01311-000" vira 1311000 e perde o zero inicial.
        if let Some(postal_code) = filter.postal_code.as_deref() {
            let digits = digits_only(postal_code);
            if let Ok(value) = digits.parse::<i64>() {
                predicates.push(Predicate::Eq {
                    column: COLUMN_POSTAL_CODE,
                    value: PredicateValue::Int(value),
                });
            }
        }

        if let Some(street) = filter.street.as_deref() {
            let normalized = normalize_street(street);
            if !normalized.is_empty() {
                predicates.push(Predicate::ILike {
                    column: COLUMN_STREET,
                    fragment: normalized,
                });
            }
        }

        if let Some(number) = filter.house_number.as_deref() {
            let number = number.trim();
            if !number.is_empty() {
                predicates.push(Predicate::Eq {
                    column: COLUMN_NUMBER,
                    value: PredicateValue::Text(number.to_string()),
                });
            }
        }

        Self {
            table: TRANSACTIONS_TABLE,
            predicates,
            limit: RESULT_CAP,
        }
    }

    #[cfg(test)]
    pub fn predicate_for(&self, column: &str) -> Option<&Predicate> {
        self.predicates.iter().find(|p| p.column() == column)
    }

    /// Parâmetros de query string para `GET /rest/v1/<table>`
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(
            self.predicates
                .iter()
                .map(|p| (p.column().to_string(), p.to_postgrest())),
        );
        pairs.push(("limit".to_string(), self.limit.to_string()));
        pairs
    }
}
