/*
    Scenario tests for the sync layer

    Test suite covering:
    - Full sign-in / sign-out flows through identity and settings stores
    - Out-of-order reload completion under both reload policies
    - Property tests over arbitrary identity sequences
*/
