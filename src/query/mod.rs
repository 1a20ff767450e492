//! Filter compilation: the operator catalog, criteria nodes, the geo
//! translator and the fluent [`Query`] builder.

mod builder;
mod criteria;
mod field_end;
mod geo_criteria;
mod operator;
mod options;

pub use builder::{EntityIter, Query};
pub use criteria::{Criteria, CriteriaContainer, CriteriaJoin, FieldCriteria, RenderContext};
pub use field_end::{CriteriaSink, Detached, FieldEnd, criteria, quote_pattern};
pub use geo_criteria::{GeoFieldCriteria, LegacyGeoCriteria, geo_fragment};
pub use operator::{FilterOperator, OperatorClass, parse_condition};
pub use options::{Sort, parse_order};

