diesel::table! {
    users (id) {
        id -> Uuid,
        email -> Varchar,
        full_name -> Varchar,
        phone -> Nullable<Varchar>,
        role -> SmallInt,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    user_sessions (id) {
        id -> Uuid,
        user_id -> Uuid,
        created_at -> Timestamptz,
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    properties (id) {
        id -> Uuid,
        name -> Varchar,
        address -> Text,
        landlord_id -> Nullable<Uuid>,
        parent_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    leases (id) {
        id -> Uuid,
        property_id -> Uuid,
        tenant_id -> Uuid,
        rent_amount_cents -> Int8,
        start_date -> Timestamptz,
        end_date -> Timestamptz,
        is_active -> Bool,
    }
}

diesel::table! {
    maintenance_tickets (id) {
        id -> Uuid,
        subject -> Varchar,
        description -> Text,
        category -> Nullable<Varchar>,
        priority -> Varchar,
        status -> SmallInt,
        approval_status -> SmallInt,
        requires_approval -> Bool,
        claimed_by -> Nullable<Uuid>,
        confirmation -> Nullable<SmallInt>,
        resolution_note -> Nullable<Text>,
        resolution_date -> Nullable<Timestamptz>,
        cost_cents -> Nullable<Int8>,
        artisan_name -> Nullable<Varchar>,
        artisan_phone -> Nullable<Varchar>,
        payer_type -> Nullable<SmallInt>,
        property_id -> Uuid,
        landlord_id -> Nullable<Uuid>,
        rent_cycle_id -> Nullable<Uuid>,
        tenant_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_comments (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        author_id -> Uuid,
        author_name -> Varchar,
        author_role -> SmallInt,
        content -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    landlord_expenses (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        landlord_id -> Uuid,
        rent_cycle_id -> Nullable<Uuid>,
        amount_cents -> Int8,
        status -> SmallInt,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    rent_cycles (id) {
        id -> Uuid,
        landlord_id -> Uuid,
        start_date -> Timestamptz,
        end_date -> Timestamptz,
        status -> SmallInt,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (id) {
        id -> Uuid,
        user_id -> Uuid,
        kind -> Varchar,
        title -> Varchar,
        message -> Text,
        link -> Nullable<Varchar>,
        is_read -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    user_sessions,
    properties,
    leases,
    maintenance_tickets,
    ticket_comments,
    landlord_expenses,
    rent_cycles,
    notifications,
);
