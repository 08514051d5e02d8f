diesel::table! {
    repository (id) {
        id -> BigInt,
        address -> Text,
        enabled -> Bool,
        deleted -> Bool,
        data -> Jsonb,
    }
}

diesel::table! {
    product (repository_id, package_name) {
        repository_id -> BigInt,
        package_name -> Text,
        name -> Text,
        summary -> Text,
        version -> Text,
        compatible -> Bool,
        data -> Jsonb,
    }
}

diesel::table! {
    product_staging (repository_id, package_name) {
        repository_id -> BigInt,
        package_name -> Text,
        name -> Text,
        summary -> Text,
        version -> Text,
        compatible -> Bool,
        data -> Jsonb,
    }
}

diesel::allow_tables_to_appear_in_same_query!(repository, product, product_staging,);
